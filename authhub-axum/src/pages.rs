use authhub_core::{IdentityRecord, ProviderKind};
use authhub_flow::LoginVariant;

/// Escape text for inclusion in HTML element content or a quoted attribute.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{}</body></html>",
        escape(title),
        body
    )
}

pub fn error_page(title: &str, message: &str) -> String {
    layout(
        title,
        &format!(
            "<h1>{}</h1><p>{}</p><p><a href=\"/\">Back to home</a></p>",
            escape(title),
            escape(message)
        ),
    )
}

fn label(variant: &LoginVariant) -> String {
    let name = variant
        .path
        .trim_start_matches('/')
        .trim_end_matches("-login");
    match variant.provider {
        ProviderKind::OsspidDirect => "Login with OSSPID (direct)".to_string(),
        ProviderKind::Uatid => "Login with UATID".to_string(),
        ProviderKind::Keycloak => format!("Login via Keycloak ({name})"),
    }
}

pub fn home_page(
    user: Option<&IdentityRecord>,
    login_type: Option<ProviderKind>,
    variants: &[LoginVariant],
) -> String {
    let body = match user {
        Some(user) => {
            let field = |value: Option<&str>| escape(value.unwrap_or("-"));
            format!(
                "<h1>Welcome, {}!</h1><ul>\
                 <li>Username: {}</li>\
                 <li>Name: {}</li>\
                 <li>Email: {}</li>\
                 <li>Identity provider: {}</li>\
                 <li>Login type: {}</li>\
                 </ul>\
                 <form method=\"post\" action=\"/refresh\"><button>Refresh token</button></form>\
                 <p><a href=\"/logout\">Logout</a></p>",
                escape(user.greeting_name()),
                field(user.preferred_username.as_deref()),
                field(user.display_name.as_deref()),
                field(user.email.as_deref()),
                field(user.identity_provider_label.as_deref()),
                escape(login_type.map(|k| k.as_str()).unwrap_or("-")),
            )
        }
        None => {
            let links: String = variants
                .iter()
                .map(|v| {
                    format!(
                        "<li><a href=\"{}\">{}</a></li>",
                        escape(&v.path),
                        escape(&label(v))
                    )
                })
                .collect();
            format!("<h1>Sign in</h1><ul>{links}</ul>")
        }
    };
    layout("Authhub", &body)
}
