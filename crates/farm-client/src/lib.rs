#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! HTTP device client: speaks the fixed printer-host REST dialect
//! (ping, command issue, upload+start, status/job polling, cancel).

mod client;
mod error;
mod wire;

pub use client::{DeviceClient, END_OF_FILE_SENTINEL};
pub use error::{DeviceClientError, Result};
pub use wire::{JobState, PrinterFlags, PrinterState, Temperatures};

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ping_true_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/version"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = DeviceClient::new(server.uri().parse().unwrap(), "key");
        assert!(client.ping().await);
    }

    #[tokio::test]
    async fn ping_false_on_connection_failure() {
        let client = DeviceClient::new("http://127.0.0.1:1".parse().unwrap(), "key");
        assert!(!client.ping().await);
    }

    #[tokio::test]
    async fn issue_commands_ok_on_204() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/printer/command"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = DeviceClient::new(server.uri().parse().unwrap(), "key");
        client.issue_commands(&["G28"]).await.unwrap();
    }

    #[tokio::test]
    async fn fetch_printer_state_parses_flags_and_temps() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/printer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": {"flags": {"operational": true, "printing": true, "ready": false}},
                "temperature": {"tool0": {"actual": 205.0}, "bed": {"actual": 60.0}}
            })))
            .mount(&server)
            .await;

        let client = DeviceClient::new(server.uri().parse().unwrap(), "key");
        let state = client.fetch_printer_state().await.unwrap();
        assert!(state.flags.printing);
        assert!(!state.flags.ready);
        assert_eq!(state.temperature.tool, Some(205.0));
        assert_eq!(state.temperature.bed, Some(60.0));
    }

    #[tokio::test]
    async fn upload_and_start_returns_filename_when_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/files/local"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"done": true})))
            .mount(&server)
            .await;

        let client = DeviceClient::new(server.uri().parse().unwrap(), "key");
        let name = client
            .upload_and_start("part.gcode", b"G28".to_vec())
            .await
            .unwrap();
        assert_eq!(name, "part.gcode");
    }
}
