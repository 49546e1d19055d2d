//! Email service for account and order notifications.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and text templates.
//! Without SMTP configuration the service logs each message it would have
//! sent and succeeds, so local development needs no mail server.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::{OrderItem, OrderWithItems};

#[derive(Template)]
#[template(path = "email/verify_email.html")]
struct VerifyEmailHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_email.txt")]
struct VerifyEmailText<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    link: &'a str,
}

/// One line of the order confirmation.
struct ConfirmationLine<'a> {
    name: &'a str,
    variant: String,
    quantity: i32,
    line_total: Decimal,
}

impl<'a> From<&'a OrderItem> for ConfirmationLine<'a> {
    fn from(item: &'a OrderItem) -> Self {
        let variant = [item.color.as_str(), item.size.as_str()]
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(" / ");
        Self {
            name: &item.product_name,
            variant,
            quantity: item.quantity,
            line_total: item.line_total(),
        }
    }
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a OrderWithItems,
    lines: &'a [ConfirmationLine<'a>],
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a OrderWithItems,
    lines: &'a [ConfirmationLine<'a>],
    link: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: Option<Mailer>,
    base_url: String,
}

impl EmailService {
    /// Create an email service. `None` config gives a logging no-op service.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay address is invalid.
    pub fn new(config: Option<&EmailConfig>, base_url: &str) -> Result<Self, SmtpError> {
        let mailer = config
            .map(|config| {
                let credentials = Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.expose_secret().to_owned(),
                );
                let transport =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                        .port(config.smtp_port)
                        .credentials(credentials)
                        .build();
                Ok::<_, SmtpError>(Mailer {
                    transport,
                    from_address: config.from_address.clone(),
                })
            })
            .transpose()?;

        Ok(Self {
            mailer,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Whether messages are actually delivered.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.mailer.is_some()
    }

    /// Send the email-verification link after registration.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_verification(&self, to: &str, name: &str, token: &str) -> Result<(), EmailError> {
        let link = format!("{}/verify-email?token={token}", self.base_url);
        let html = VerifyEmailHtml { name, link: &link }.render()?;
        let text = VerifyEmailText { name, link: &link }.render()?;
        self.send_multipart_email(to, "Confirm your InsightShop email", &text, &html)
            .await
    }

    /// Send a password-reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(&self, to: &str, name: &str, token: &str) -> Result<(), EmailError> {
        let link = format!("{}/reset-password?token={token}", self.base_url);
        let html = PasswordResetHtml { name, link: &link }.render()?;
        let text = PasswordResetText { name, link: &link }.render()?;
        self.send_multipart_email(to, "Reset your InsightShop password", &text, &html)
            .await
    }

    /// Send the order confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        order: &OrderWithItems,
    ) -> Result<(), EmailError> {
        let lines: Vec<ConfirmationLine<'_>> = order.items.iter().map(Into::into).collect();
        let link = format!("{}/orders/{}", self.base_url, order.order.id);
        let html = OrderConfirmationHtml {
            order,
            lines: &lines,
            link: &link,
        }
        .render()?;
        let text = OrderConfirmationText {
            order,
            lines: &lines,
            link: &link,
        }
        .render()?;
        let subject = format!("Your InsightShop order {}", order.order.order_number);
        self.send_multipart_email(to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let Some(mailer) = &self.mailer else {
            tracing::info!(to = %to, subject = %subject, "SMTP not configured, email skipped");
            return Ok(());
        };

        let email = Message::builder()
            .from(
                mailer
                    .from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(mailer.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_owned()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_owned()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_owned()),
                    ),
            )?;

        mailer.transport.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use insightshop_core::{OrderId, OrderItemId, OrderStatus, ProductId};

    use super::*;
    use crate::models::order::fixtures::order;

    fn confirmation() -> OrderWithItems {
        OrderWithItems {
            order: order(OrderStatus::Pending, None),
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(1),
                product_id: ProductId::new(4),
                product_name: "Linen <Shirt>".to_owned(),
                price: Decimal::new(2500, 2),
                quantity: 2,
                color: "white".to_owned(),
                size: "M".to_owned(),
            }],
        }
    }

    #[test]
    fn test_confirmation_line_variant() {
        let order = confirmation();
        let line = ConfirmationLine::from(order.items.first().unwrap());
        assert_eq!(line.variant, "white / M");
        assert_eq!(line.line_total, Decimal::new(5000, 2));
    }

    #[test]
    fn test_order_confirmation_renders_and_escapes() {
        let order = confirmation();
        let lines: Vec<ConfirmationLine<'_>> = order.items.iter().map(Into::into).collect();
        let html = OrderConfirmationHtml {
            order: &order,
            lines: &lines,
            link: "https://shop.test/orders/1",
        }
        .render()
        .unwrap();
        assert!(html.contains("IS-20250101-ABC123"));
        assert!(html.contains("Linen &#60;Shirt&#62;") || html.contains("Linen &lt;Shirt&gt;"));

        let text = OrderConfirmationText {
            order: &order,
            lines: &lines,
            link: "https://shop.test/orders/1",
        }
        .render()
        .unwrap();
        assert!(text.contains("2 x Linen <Shirt> (white / M)"));
    }

    #[tokio::test]
    async fn test_unconfigured_service_skips_delivery() {
        let service = EmailService::new(None, "https://shop.test/").unwrap();
        assert!(!service.is_configured());
        service
            .send_verification("ada@example.com", "Ada", "token")
            .await
            .unwrap();
    }
}
