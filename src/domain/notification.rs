use chrono::DateTime;
use chrono::Utc;
use htmlescape::encode_minimal;

use super::Location;
use super::SignupRequest;

/// The chat message announcing a signup. Built once, sent once, never stored.
///
/// Rendered for Telegram's `HTML` parse mode, so everything that came from the
/// client is escaped.
#[derive(Debug)]
pub struct Notification(String);

impl Notification {
    pub fn new(
        signup: &SignupRequest,
        location: &Location,
        now: DateTime<Utc>,
    ) -> Self {
        // `toLocaleString("en-US")`-style: 3/1/2024, 5:00:00 PM
        let fmt = "%-m/%-d/%Y, %-I:%M:%S %p";
        let (time, zone) = match location.tz() {
            Some(tz) => (
                now.with_timezone(&tz).format(fmt).to_string(),
                location.timezone.as_str(),
            ),
            None => (now.format(fmt).to_string(), "UTC"),
        };
        let flag = location.flag();
        let country = match flag.is_empty() {
            true => encode_minimal(&location.country),
            false => format!("{} {flag}", encode_minimal(&location.country)),
        };

        Self(format!(
            "📩 <b>New signup</b>\n\
             \n\
             👤 <b>Email:</b> {email}\n\
             🌍 <b>Country:</b> {country}\n\
             🏙 <b>City:</b> {city}\n\
             📌 <b>IP:</b> {ip}\n\
             📱 <b>Device:</b> {device}\n\
             ⏰ <b>Time:</b> {time} ({zone})",
            email = encode_minimal(&signup.email),
            city = encode_minimal(&location.city),
            ip = encode_minimal(&signup.client_addr),
            device = encode_minimal(&signup.user_agent),
            zone = encode_minimal(zone),
        ))
    }
}

impl AsRef<str> for Notification {
    fn as_ref(&self) -> &str { &self.0 }
}
