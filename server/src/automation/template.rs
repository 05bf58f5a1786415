use minijinja::{context, Environment};

use super::matcher::EmailView;

pub fn validate_template(source: &str) -> Result<(), String> {
    let env = Environment::new();
    env.template_from_str(source)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Splits "Display Name <addr@host>" into (name, address). Falls back to the
/// local part of the address when no display name is present.
pub fn split_sender(sender: &str) -> (String, String) {
    let sender = sender.trim();
    if let (Some(start), Some(end)) = (sender.find('<'), sender.rfind('>')) {
        if start < end {
            let address = sender[start + 1..end].trim().to_string();
            let name = sender[..start].trim().trim_matches('"').trim().to_string();
            if !name.is_empty() {
                return (name, address);
            }
            let local = address.split('@').next().unwrap_or("").to_string();
            return (local, address);
        }
    }

    let address = sender.to_string();
    let local = address.split('@').next().unwrap_or("").to_string();
    (local, address)
}

/// Renders a reply body template against the triggering email's fields.
pub fn render_reply(
    source: &str,
    email: &EmailView,
    user_email: &str,
) -> Result<String, minijinja::Error> {
    let (sender_name, sender_email) = split_sender(email.sender);
    let env = Environment::new();
    env.render_str(
        source,
        context! {
            sender_name,
            sender_email,
            subject => email.subject,
            user_email,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sender_with_display_name() {
        let (name, addr) = split_sender("Jane Doe <jane@example.com>");
        assert_eq!(name, "Jane Doe");
        assert_eq!(addr, "jane@example.com");
    }

    #[test]
    fn test_split_sender_bare_address() {
        let (name, addr) = split_sender("jane@example.com");
        assert_eq!(name, "jane");
        assert_eq!(addr, "jane@example.com");
    }

    #[test]
    fn test_split_sender_quoted_name() {
        let (name, addr) = split_sender("\"Doe, Jane\" <jane@example.com>");
        assert_eq!(name, "Doe, Jane");
        assert_eq!(addr, "jane@example.com");
    }

    #[test]
    fn test_render_reply_substitutes_fields() {
        let email = EmailView {
            sender: "Jane Doe <jane@example.com>",
            subject: "Invoice 42",
            body: "",
        };

        let rendered = render_reply(
            "Hi {{ sender_name }}, I received \"{{ subject }}\" and will reply from {{ user_email }}.",
            &email,
            "me@example.com",
        )
        .unwrap();

        assert_eq!(
            rendered,
            "Hi Jane Doe, I received \"Invoice 42\" and will reply from me@example.com."
        );
    }

    #[test]
    fn test_validate_template_rejects_bad_syntax() {
        assert!(validate_template("Hi {{ sender_name }}").is_ok());
        assert!(validate_template("Hi {{ sender_name").is_err());
    }
}
