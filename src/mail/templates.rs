use super::Email;

pub fn welcome_email(to_email: &str, to_name: &str) -> Email {
    let subject = "Welcome to Sprintboard!".to_string();
    let text = format!(
        "Hi {to_name},\n\n\
         Your Sprintboard account is ready. Create a project, invite your team and start \
         collecting XP as you close tasks.\n\n\
         See you on the board!"
    );
    let html = format!(
        "<p>Hi {name},</p>\
         <p>Your Sprintboard account is ready. Create a project, invite your team and start \
         collecting XP as you close tasks.</p>\
         <p>See you on the board!</p>",
        name = escape_html(to_name)
    );
    Email {
        to_email: to_email.to_string(),
        to_name: to_name.to_string(),
        subject,
        text,
        html,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
