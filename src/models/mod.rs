mod account;
mod activation_key;
mod online_payment;
mod sales_point;
mod stats;

pub use account::*;
pub use activation_key::*;
pub use online_payment::*;
pub use sales_point::*;
pub use stats::*;
