use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use serde_json::json;

#[derive(Debug)]
pub struct MailError(pub String);

impl Display for MailError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for MailError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Transactional mail. Callers treat failures as log-and-continue; a lost
/// email never fails an order.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

/// Bearer-auth JSON client for a Resend-style `/emails` endpoint.
pub struct RestMailer {
    base_url: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl RestMailer {
    #[must_use]
    pub fn new(base_url: String, api_key: String, from: String) -> Self {
        Self {
            base_url,
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for RestMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let response = self
            .client
            .post(format!("{}/emails", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": email.to,
                "subject": email.subject,
                "html": email.html,
            }))
            .send()
            .await
            .map_err(|e| MailError(format!("mail request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError(format!("mail send failed ({status}): {body}")));
        }
        Ok(())
    }
}

fn first_name(customer_name: &str) -> &str {
    customer_name
        .split_whitespace()
        .next()
        .unwrap_or(customer_name)
}

pub fn download_email(to: &str, customer_name: &str, download_url: &str) -> OutboundEmail {
    let first = first_name(customer_name);
    OutboundEmail {
        to: to.to_string(),
        subject: format!("{first}, seu retrato está pronto!"),
        html: format!(
            "<h2>Sua obra-prima está pronta!</h2>\
             <p>Olá {first}, seu retrato ficou incrível! Clique no botão abaixo para baixar \
             em alta resolução, sem marca d'água.</p>\
             <p><a href=\"{download_url}\">Baixar retrato HD</a></p>\
             <p>Este link é válido por 7 dias. Salve a imagem assim que possível.</p>"
        ),
    }
}

pub fn confirmation_email(
    to: &str,
    customer_name: &str,
    product_name: &str,
    price: &str,
    order_ref: &str,
) -> OutboundEmail {
    let first = first_name(customer_name);
    let short_ref: String = order_ref.chars().take(8).collect();
    OutboundEmail {
        to: to.to_string(),
        subject: format!("Pedido confirmado! Seu {product_name} está a caminho"),
        html: format!(
            "<h2>Pedido confirmado!</h2>\
             <p>Olá {first}, recebemos seu pedido e já estamos preparando tudo.</p>\
             <p>Pedido #{short_ref}<br>Produto: {product_name}<br>Valor: {price}</p>\
             <p>Pagamento confirmado. Impressão em 1-2 dias úteis, envio pelos Correios com \
             código de rastreio, entrega estimada em 5-10 dias úteis.</p>\
             <p>Você receberá outro e-mail com o código de rastreio assim que enviarmos seu \
             pedido.</p>"
        ),
    }
}

pub fn shipping_email(
    to: &str,
    customer_name: &str,
    tracking_code: &str,
    product_name: &str,
) -> OutboundEmail {
    let first = first_name(customer_name);
    OutboundEmail {
        to: to.to_string(),
        subject: format!("Seu {product_name} foi enviado! Rastreio: {tracking_code}"),
        html: format!(
            "<h2>Seu pedido foi enviado!</h2>\
             <p>Olá {first}, seu {product_name} acabou de ser despachado!</p>\
             <p>Código de rastreio: <strong>{tracking_code}</strong></p>\
             <p><a href=\"https://www.linkcorreios.com.br/?id={tracking_code}\">Rastrear \
             pedido</a></p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greetings_use_the_first_name_only() {
        let email = download_email("ana@example.com", "Ana Paula Souza", "https://x/dl");
        assert!(email.subject.starts_with("Ana,"));
        assert!(email.html.contains("Olá Ana,"));
        assert!(email.html.contains("https://x/dl"));
    }

    #[test]
    fn confirmation_shortens_the_order_reference() {
        let email = confirmation_email(
            "b@example.com",
            "Bruno Lima",
            "Quadro Canvas",
            "R$ 199,00",
            "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9",
        );
        assert!(email.html.contains("#0a1b2c3d"));
        assert!(!email.html.contains("0a1b2c3d-4e5f"));
        assert!(email.html.contains("R$ 199,00"));
    }

    #[test]
    fn shipping_links_the_carrier_tracker() {
        let email = shipping_email("c@example.com", "Clara", "BR123BR", "Fine Art Print");
        assert!(email.subject.contains("BR123BR"));
        assert!(email
            .html
            .contains("https://www.linkcorreios.com.br/?id=BR123BR"));
    }
}
