use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, Result, msg};

/// Absent field → `None` (leave unchanged), explicit null → `Some(None)`
/// (clear the column), value → `Some(Some(v))`.
fn deserialize_optional_nullable<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

fn validate_code(code: &str) -> Result<()> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(msg::SALES_POINT_CODE_INVALID.into()));
    }
    Ok(())
}

fn validate_commission(rate: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&rate) {
        return Err(AppError::Validation(msg::COMMISSION_OUT_OF_RANGE.into()));
    }
    Ok(())
}

/// A resale channel that distributes activation keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesPoint {
    pub id: String,
    /// Short channel code; its first three characters prefix every key.
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub is_active: bool,
    /// Percentage kept by the sales point, 0-100.
    pub commission_rate: f64,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The slice of a sales point carried alongside keys and real users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesPointRef {
    pub id: String,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSalesPoint {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub commission_rate: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateSalesPoint {
    pub fn validate(&self) -> Result<()> {
        validate_code(&self.code)?;
        if self.name.trim().is_empty() {
            return Err(AppError::Validation(msg::NAME_EMPTY.into()));
        }
        validate_commission(self.commission_rate)
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSalesPoint {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub contact_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub contact_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub contact_email: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub commission_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable")]
    pub notes: Option<Option<String>>,
}

impl UpdateSalesPoint {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref code) = self.code {
            validate_code(code)?;
        }
        if let Some(ref name) = self.name
            && name.trim().is_empty()
        {
            return Err(AppError::Validation(msg::NAME_EMPTY.into()));
        }
        if let Some(rate) = self.commission_rate {
            validate_commission(rate)?;
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
