//! HTML email bodies for the lead pipeline.

use tracing::warn;
use url::Url;

use super::model::Lead;

pub const GUIDE_SUBJECT: &str = "Your CRM Automation Guide inside \u{1F4E6}";
pub const REMINDER_SUBJECT: &str = "Quick question about your automation guide...";

/// Links rendered into outgoing emails.
#[derive(Debug, Clone)]
pub struct TemplateLinks {
    /// Public booking page; lead details are appended as query parameters.
    pub booking_page_url: String,
    /// Downloadable guide.
    pub guide_url: String,
}

impl Default for TemplateLinks {
    fn default() -> Self {
        Self {
            booking_page_url: "https://lead.bitlancetechhub.com/booking".to_string(),
            guide_url: "https://example.com/dummy-guide.pdf".to_string(),
        }
    }
}

impl TemplateLinks {
    /// Booking link prefilled with the lead's contact details.
    pub fn booking_link(&self, lead: &Lead) -> String {
        let Ok(mut url) = Url::parse(&self.booking_page_url) else {
            warn!(url = %self.booking_page_url, "Booking page URL does not parse; linking it bare");
            return self.booking_page_url.clone();
        };
        url.query_pairs_mut()
            .append_pair("email", &lead.email)
            .append_pair("userid", &lead.id.to_string())
            .append_pair("phoneno", &lead.phone)
            .append_pair("name", &lead.name);
        url.into()
    }
}

/// Escape text interpolated into HTML.
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

const BASE_STYLE: &str = "body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .container { max-width: 600px; margin: 0 auto; padding: 20px; border: 1px solid #ddd; border-radius: 8px; }
        .btn { display: inline-block; padding: 12px 24px; color: #fff; text-decoration: none; border-radius: 6px; font-weight: bold; margin-top: 20px; }
        .footer { margin-top: 30px; font-size: 12px; color: #888; text-align: center; }";

/// Sent right after a guide download.
pub fn guide_delivery_html(lead: &Lead, links: &TemplateLinks) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <style>
        {BASE_STYLE}
        .container {{ border-top: 4px solid #10b981; }}
        h2 {{ color: #047857; }}
        .btn {{ background-color: #10b981; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Your Automation Guide is Here!</h2>
        <p>Hi {name},</p>
        <p>Thank you for requesting the blueprint. As promised, you can download your free guide right below:</p>
        <center>
            <a href="{guide}" class="btn">Download Blueprint PDF</a>
        </center>
        <p>If you're ready to skip the DIY phase and have our team build this for you, you can <a href="{booking}">book a free strategy mapping session here</a>.</p>
        <p>Best regards,</p>
        <p><strong>- The AutoSync Team</strong></p>
    </div>
</body>
</html>
"#,
        name = escape_html(&lead.name),
        guide = escape_html(&links.guide_url),
        booking = escape_html(&links.booking_link(lead)),
    )
}

/// Sent by the sweep once a guide download has gone 24h without a booking.
pub fn reminder_html(lead: &Lead, links: &TemplateLinks) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <style>
        {BASE_STYLE}
        .container {{ border-top: 4px solid #3b82f6; }}
        h2 {{ color: #1e3a8a; }}
        .btn {{ background-color: #3b82f6; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Hi {name}, let's automate your growth.</h2>
        <p>I noticed you downloaded our automation guide yesterday.</p>
        <p>Reading the guide is a great first step, but if you want to skip the trial-and-error phase, we can show you exactly how this system applies to your specific business model.</p>
        <p>Let's hop on a quick 15-minute strategy call. No sales pressure, just pure value.</p>
        <center>
            <a href="{booking}" class="btn">Book Your Free Strategy Demo</a>
        </center>
        <p>Looking forward to speaking with you!</p>
        <p><strong>- The AutoSync Team</strong></p>
        <div class="footer">
            <p>You received this email because you opted in on our website.</p>
        </div>
    </div>
</body>
</html>
"#,
        name = escape_html(&lead.name),
        booking = escape_html(&links.booking_link(lead)),
    )
}
