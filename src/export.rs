//! CSV rendering for key and real-user listings.
//!
//! Every cell is quoted with embedded quotes doubled; dates are `YYYY-MM-DD`
//! in UTC.

use chrono::DateTime;

use crate::models::{ActivationKey, RealUser};

const KEY_HEADERS: &[&str] = &[
    "Code",
    "Sales Point",
    "Duration (days)",
    "Status",
    "User Name",
    "Email",
    "Speciality",
    "Year of Study",
    "Region",
    "Used At",
    "Created At",
];

const REAL_USER_HEADERS: &[&str] = &[
    "Email",
    "Name",
    "Year of Study",
    "Speciality",
    "Region",
    "Source",
    "Sales Point",
    "Location",
    "Activation Code",
    "Activated At",
    "Status",
    "Expires At",
];

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

fn date(ts: Option<i64>) -> String {
    ts.and_then(|t| DateTime::from_timestamp(t, 0))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn render(headers: &[&str], rows: impl Iterator<Item = Vec<String>>) -> String {
    let mut lines = vec![headers.join(",")];
    lines.extend(rows.map(|row| {
        row.iter()
            .map(|cell| quote(cell))
            .collect::<Vec<_>>()
            .join(",")
    }));
    lines.join("\n")
}

pub fn keys_to_csv(keys: &[ActivationKey]) -> String {
    render(
        KEY_HEADERS,
        keys.iter().map(|key| {
            let user = key.used_by_account.as_ref();
            vec![
                key.key_code.clone(),
                key.sales_point
                    .as_ref()
                    .map(|sp| sp.name.clone())
                    .unwrap_or_default(),
                key.duration_days.to_string(),
                key.status().as_ref().to_string(),
                user.and_then(|u| u.full_name.clone()).unwrap_or_default(),
                user.map(|u| u.email.clone()).unwrap_or_default(),
                user.and_then(|u| u.speciality.clone()).unwrap_or_default(),
                user.and_then(|u| u.year_of_study)
                    .map(|y| y.to_string())
                    .unwrap_or_default(),
                user.and_then(|u| u.region.clone()).unwrap_or_default(),
                date(key.used_at),
                date(Some(key.created_at)),
            ]
        }),
    )
}

pub fn real_users_to_csv(users: &[RealUser]) -> String {
    render(
        REAL_USER_HEADERS,
        users.iter().map(|user| {
            vec![
                user.email.clone(),
                user.full_name.clone().unwrap_or_default(),
                user.year_of_study.map(|y| y.to_string()).unwrap_or_default(),
                user.speciality.clone().unwrap_or_default(),
                user.region.clone().unwrap_or_default(),
                user.source.as_ref().to_string(),
                user.sales_point_name.clone().unwrap_or_default(),
                user.sales_point_location.clone().unwrap_or_default(),
                user.key_code.clone(),
                date(Some(user.activated_at)),
                if user.is_active { "active" } else { "expired" }.to_string(),
                date(user.subscription_expires_at),
            ]
        }),
    )
}
