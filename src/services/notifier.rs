// src/services/notifier.rs

//! Notification transport.
//!
//! The engine only sees the [`Notifier`] trait; [`TwilioNotifier`] is the
//! HTTP implementation used by the CLI.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{DeliveryId, NotifierConfig};
use crate::utils::http::create_async_client;

/// Outbound messaging capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `body` to `destination`, returning the provider's delivery id.
    async fn send(&self, destination: &str, body: &str) -> Result<DeliveryId>;
}

/// Check that an address is `whatsapp:+<digits>` or `+<digits>`.
pub fn validate_destination(destination: &str) -> Result<()> {
    let number = destination
        .strip_prefix("whatsapp:")
        .unwrap_or(destination)
        .trim();
    let valid = number
        .strip_prefix('+')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));

    if valid {
        Ok(())
    } else {
        Err(AppError::transport(destination, "malformed destination address"))
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Clone)]
struct Credentials {
    account_sid: String,
    auth_token: String,
    from: String,
}

/// WhatsApp delivery through the Twilio Messages API.
pub struct TwilioNotifier {
    client: Client,
    endpoint: Url,
    credentials: Credentials,
    max_retries: u32,
    retry_backoff: Duration,
}

impl TwilioNotifier {
    /// Build a notifier from configuration. Missing credentials are a configuration error.
    pub fn new(config: &NotifierConfig) -> Result<Self> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AppError::config(format!("notifier.{name} is not set")))
        };
        let credentials = Credentials {
            account_sid: required(&config.account_sid, "account_sid")?,
            auth_token: required(&config.auth_token, "auth_token")?,
            from: required(&config.from, "from")?,
        };

        let endpoint = Url::parse(&config.api_base)?.join(&format!(
            "/2010-04-01/Accounts/{}/Messages.json",
            credentials.account_sid
        ))?;

        Ok(Self {
            client: create_async_client(config)?,
            endpoint,
            credentials,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post_once(&self, destination: &str, body: &str) -> Attempt {
        let form = [
            ("From", self.credentials.from.as_str()),
            ("To", destination),
            ("Body", body),
        ];

        let response = match self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(AppError::transport(destination, e)),
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return match parse_delivery_id(&text) {
                Ok(sid) => Attempt::Delivered(sid),
                Err(e) => {
                    // Accepted by the provider; resending would duplicate the message.
                    let sid = format!("unknown-{}", Utc::now().timestamp_millis());
                    log::warn!(
                        "Delivered to {} but the response had no message id ({}); recorded as {}",
                        destination,
                        e,
                        sid
                    );
                    Attempt::Delivered(sid)
                }
            };
        }

        let error = AppError::transport(
            destination,
            format!("HTTP {}: {}", status.as_u16(), text.trim()),
        );
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Attempt::Retry(error)
        } else {
            Attempt::Rejected(error)
        }
    }
}

/// Result of a single POST to the provider.
enum Attempt {
    Delivered(DeliveryId),
    /// Network failure, 5xx or 429
    Retry(AppError),
    /// Any other non-success status; retrying cannot help
    Rejected(AppError),
}

fn parse_delivery_id(text: &str) -> Result<DeliveryId> {
    let parsed: MessageResponse = serde_json::from_str(text)?;
    Ok(parsed.sid)
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, destination: &str, body: &str) -> Result<DeliveryId> {
        validate_destination(destination)?;

        let mut delay = self.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.post_once(destination, body).await {
                Attempt::Delivered(sid) => {
                    log::debug!("Delivered to {} as {}", destination, sid);
                    return Ok(sid);
                }
                Attempt::Retry(e) if attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "Send to {} failed (attempt {}/{}): {}",
                        destination,
                        attempt,
                        self.max_retries + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Attempt::Retry(e) | Attempt::Rejected(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const DEST: &str = "whatsapp:+911234567890";

    fn config() -> NotifierConfig {
        NotifierConfig {
            account_sid: Some("AC123".into()),
            auth_token: Some("secret".into()),
            from: Some("whatsapp:+14155238886".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_destination() {
        assert!(validate_destination("whatsapp:+911234567890").is_ok());
        assert!(validate_destination("+911234567890").is_ok());

        for bad in ["", "911234567890", "whatsapp:", "whatsapp:+", "+91 123", "sms:+91123"] {
            let err = validate_destination(bad).unwrap_err();
            assert!(matches!(err, AppError::Transport { .. }), "{bad}");
        }
    }

    #[test]
    fn test_missing_credentials_is_config_error() {
        let mut cfg = config();
        cfg.auth_token = None;
        let err = TwilioNotifier::new(&cfg).err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_endpoint() {
        let notifier = TwilioNotifier::new(&config()).unwrap();
        assert_eq!(
            notifier.endpoint().as_str(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[test]
    fn test_parse_delivery_id() {
        let sid = parse_delivery_id(r#"{"sid": "SM42", "status": "queued"}"#).unwrap();
        assert_eq!(sid, "SM42");
        assert!(parse_delivery_id("{}").is_err());
    }

    #[tokio::test]
    async fn test_malformed_destination_never_hits_network() {
        let notifier = TwilioNotifier::new(&config()).unwrap();
        let err = notifier.send("not-a-number", "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Transport { .. }));
    }

    /// Read one request: headers plus `Content-Length` bytes of body.
    async fn read_request(socket: &mut TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Answer every request with `status` and `body`, counting requests.
    async fn serve(status: &'static str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    fn local_notifier(api_base: String, max_retries: u32) -> TwilioNotifier {
        let mut notifier = TwilioNotifier::new(&NotifierConfig {
            api_base,
            max_retries,
            retry_backoff_ms: 1,
            ..config()
        })
        .unwrap();
        notifier.client = Client::builder().no_proxy().build().unwrap();
        notifier
    }

    #[tokio::test]
    async fn test_delivery_id_from_created_response() {
        let (base, hits) = serve("201 Created", r#"{"sid":"SM1","status":"queued"}"#).await;
        let notifier = local_notifier(base, 2);

        assert_eq!(notifier.send(DEST, "hi").await.unwrap(), "SM1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_retries_then_fails() {
        let (base, hits) = serve("503 Service Unavailable", r#"{"message":"down"}"#).await;
        let notifier = local_notifier(base, 2);

        let err = notifier.send(DEST, "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Transport { ref message, .. } if message.contains("503")));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let (base, hits) = serve("429 Too Many Requests", "{}").await;
        let notifier = local_notifier(base, 1);

        assert!(notifier.send(DEST, "hi").await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (base, hits) = serve("400 Bad Request", r#"{"code":21211}"#).await;
        let notifier = local_notifier(base, 3);

        let err = notifier.send(DEST, "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Transport { ref message, .. } if message.contains("400")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_without_id_counts_as_delivered() {
        let (base, hits) = serve("200 OK", "accepted").await;
        let notifier = local_notifier(base, 3);

        let sid = notifier.send(DEST, "hi").await.unwrap();
        assert!(sid.starts_with("unknown-"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = local_notifier(base, 1).send(DEST, "hi").await.unwrap_err();
        assert!(matches!(err, AppError::Transport { .. }));
    }
}
