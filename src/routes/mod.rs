mod health_check;
mod session;
mod users;

pub use health_check::{api_health, health_check};
pub use session::{logout, refresh_token};
pub use users::{list_users, login, signup, signup_info};

