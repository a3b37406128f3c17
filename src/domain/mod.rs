mod location;
mod notification;
mod signup;

pub use location::Location;
pub use notification::Notification;
pub use signup::SignupForm;
pub use signup::SignupRequest;
pub use signup::UNKNOWN;
