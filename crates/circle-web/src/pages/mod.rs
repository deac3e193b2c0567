//! Page Components

mod callback;
mod checkout;
mod dashboard;
mod home;
mod login;
mod profile;
mod success;

pub use callback::AuthCallbackPage;
pub use checkout::CheckoutPage;
pub use dashboard::DashboardPage;
pub use home::HomePage;
pub use login::LoginPage;
pub use profile::ProfilePage;
pub use success::SuccessPage;
