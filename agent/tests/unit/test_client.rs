//! Client tick tests against a scripted server

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use ddi_agent::ddi::client::{DdiClient, WorkOutcome};
use ddi_agent::ddi::config_data::ConfigDataPayload;
use ddi_agent::ddi::identity::CredentialKind;
use ddi_agent::ddi::poll::PollState;
use ddi_agent::deploy::fsm::{DeploymentMode, ExecutionResult, ExecutionStatus, ATTEMPT_DELAY};
use ddi_agent::models::feedback::ConfigDataMode;
use ddi_agent::workers::poller::{self, PollerExit};

use crate::support::{
    artifact_href, cancel_reply, client, deployment_href, deployment_reply, identity, poll_reply,
    MockInstaller, MockTransport, CONTROLLER, HOST,
};

fn summary(client: &DdiClient<MockTransport, MockInstaller>) -> Vec<String> {
    client
        .transport()
        .requests
        .iter()
        .map(|r| format!("{} {}", r.method(), r.target()))
        .collect()
}

fn cancel_href(id: i64) -> String {
    format!("https://{}{}/cancelAction/{}", HOST, CONTROLLER, id)
}

#[tokio::test]
async fn test_forced_deployment_end_to_end() {
    let image = b"firmware image 1.1";
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(7))]))
        .ok()
        .json(
            200,
            &deployment_reply("7", "forced", &artifact_href(), image.len() as u64),
        )
        .ok()
        .binary(image)
        .ok();
    let mut client = client(transport);
    let t0 = Instant::now();

    // Poll, config data, fetch and the "proceeding" feedback
    assert_eq!(client.initialize(t0).await, WorkOutcome::Continue);
    assert_eq!(
        client.poll_state().next_poll_due,
        Some(t0 + Duration::from_millis(300_000))
    );
    assert_eq!(client.action().id(), 7);
    assert_eq!(client.action().mode(), DeploymentMode::Force);
    assert_eq!(client.action().status(), ExecutionStatus::Proceeding);
    assert!(!client.action().feedback_dirty());
    assert!(client.links().deployment_base.is_empty());

    // Install and the "closed" feedback
    assert_eq!(
        client.tick(t0 + Duration::from_secs(1)).await,
        WorkOutcome::RestartRequired
    );
    assert_eq!(client.action().id(), 0);
    assert_eq!(client.action().status(), ExecutionStatus::Closed);
    assert_eq!(client.action().result(), ExecutionResult::Success);
    assert!(!client.action().feedback_dirty());
    assert_eq!(client.installer().image, image);
    assert!(client.installer().finished);

    assert_eq!(
        summary(&client),
        vec![
            format!("GET {}", CONTROLLER),
            format!("PUT {}/configData", CONTROLLER),
            format!("GET {}/deploymentBase/7?c=-2129030598", CONTROLLER),
            format!("POST {}/deploymentBase/7/feedback", CONTROLLER),
            format!("GET {}/softwaremodules/3/artifacts/fw.bin", CONTROLLER),
            format!("POST {}/deploymentBase/7/feedback", CONTROLLER),
        ]
    );

    let requests = &client.transport().requests;
    assert_eq!(requests[1].json()["mode"], "replace");
    assert_eq!(requests[1].json()["data"], serde_json::json!({}));

    let proceeding = requests[3].json();
    assert_eq!(proceeding["id"], "7");
    assert_eq!(proceeding["status"]["execution"], "proceeding");
    assert_eq!(proceeding["status"]["result"]["finished"], "none");
    let time = proceeding["time"].as_str().unwrap();
    assert_eq!(time.len(), 15);
    assert_eq!(&time[8..9], "T");

    assert_eq!(requests[4].host, HOST);
    assert_eq!(requests[4].port, 8443);
    assert_eq!(
        requests[4].header("Accept").as_deref(),
        Some("application/octet-stream")
    );

    let closed = requests[5].json();
    assert_eq!(closed["status"]["execution"], "closed");
    assert_eq!(closed["status"]["result"]["finished"], "success");
    assert_eq!(client.transport().pending_replies(), 0);
}

#[tokio::test]
async fn test_attempt_deployment_waits_for_schedule() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(9))]))
        .json(200, &deployment_reply("9", "attempt", &artifact_href(), 4))
        .ok()
        .ok()
        .binary(b"abcd")
        .ok();
    let mut client = client(transport);
    let t0 = Instant::now();

    assert_eq!(client.tick(t0).await, WorkOutcome::Continue);
    assert_eq!(client.action().status(), ExecutionStatus::Scheduled);
    assert_eq!(client.action().scheduled_at(), t0 + ATTEMPT_DELAY);
    assert_eq!(client.transport().requests.len(), 3);
    assert_eq!(
        client.transport().last_request().json()["status"]["execution"],
        "scheduled"
    );

    // Not yet due: nothing is sent
    assert_eq!(
        client.tick(t0 + Duration::from_secs(14)).await,
        WorkOutcome::Continue
    );
    assert_eq!(client.action().status(), ExecutionStatus::Scheduled);
    assert_eq!(client.transport().requests.len(), 3);

    assert_eq!(client.tick(t0 + ATTEMPT_DELAY).await, WorkOutcome::Continue);
    assert_eq!(client.action().status(), ExecutionStatus::Proceeding);
    assert_eq!(client.transport().requests.len(), 4);
    assert_eq!(
        client.transport().last_request().json()["status"]["execution"],
        "proceeding"
    );

    assert_eq!(
        client.tick(t0 + Duration::from_secs(16)).await,
        WorkOutcome::RestartRequired
    );
    assert_eq!(client.installer().image, b"abcd");
    assert_eq!(client.transport().requests.len(), 6);
}

#[tokio::test]
async fn test_failed_poll_leaves_state_unchanged() {
    let transport = MockTransport::new()
        .refuse()
        .json(500, r#"{"error":"boom"}"#)
        .json(200, "{not json")
        .json(200, &poll_reply("00:00:30", &[]));
    let mut client = client(transport);
    let t0 = Instant::now();

    for offset in 0..3 {
        assert_eq!(
            client.tick(t0 + Duration::from_millis(offset)).await,
            WorkOutcome::Continue
        );
        assert_eq!(client.poll_state(), &PollState::default());
        assert!(client.links().deployment_base.is_empty());
    }

    // Retried on the very next tick
    let t1 = t0 + Duration::from_millis(3);
    client.tick(t1).await;
    assert_eq!(client.poll_state().poll_interval_ms, 30_000);
    assert_eq!(
        client.poll_state().next_poll_due,
        Some(t1 + Duration::from_secs(30))
    );
    assert_eq!(client.transport().pending_replies(), 0);
}

#[tokio::test]
async fn test_zero_poll_interval_falls_back_to_default() {
    let transport = MockTransport::new().json(200, &poll_reply("00:00:00", &[]));
    let mut client = client(transport);
    let t0 = Instant::now();

    client.tick(t0).await;
    assert_eq!(client.poll_state().poll_interval_ms, 0);
    assert_eq!(
        client.poll_state().next_poll_due,
        Some(t0 + Duration::from_millis(300_000))
    );

    // Not due again: no further exchange
    client.tick(t0 + Duration::from_secs(299)).await;
    assert_eq!(client.transport().requests.len(), 1);
}

#[tokio::test]
async fn test_config_data_pushed_on_link() {
    let config_href = format!("https://{}{}/configData", HOST, CONTROLLER);
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("configData", &config_href)]))
        .ok();
    let mut client = client(transport);
    client.set_config_data(ConfigDataPayload::parse(r#"{"hw":"rev2"}"#).unwrap());

    assert_eq!(client.tick(Instant::now()).await, WorkOutcome::Continue);

    let put = client.transport().last_request();
    assert_eq!(put.method(), "PUT");
    assert_eq!(put.target(), format!("{}/configData", CONTROLLER));
    assert_eq!(
        put.header("Content-Type").as_deref(),
        Some("application/json")
    );
    let body = put.json();
    assert_eq!(body["data"], serde_json::json!({"hw": "rev2"}));
    assert_eq!(body["mode"], "merge");
    assert_eq!(body["id"], "0");
    assert!(client.links().config_data.is_empty());
    assert!(!client.action().is_active());
}

#[tokio::test]
async fn test_failed_config_push_is_ignored() {
    let config_href = format!("https://{}{}/configData", HOST, CONTROLLER);
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("configData", &config_href)]))
        .json(500, "");
    let mut client = client(transport);

    assert_eq!(client.tick(Instant::now()).await, WorkOutcome::Continue);
    assert!(client.links().config_data.is_empty());
}

#[tokio::test]
async fn test_cancel_of_current_action() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:00:10", &[("deploymentBase", &deployment_href(10))]))
        .json(200, &deployment_reply("10", "attempt", &artifact_href(), 4))
        .ok()
        .json(200, &poll_reply("00:00:10", &[("cancelAction", &cancel_href(11))]))
        .json(200, &cancel_reply("11", "10"))
        .ok();
    let mut client = client(transport);
    let t0 = Instant::now();

    assert_eq!(client.tick(t0).await, WorkOutcome::Continue);
    assert_eq!(client.action().id(), 10);

    assert_eq!(
        client.tick(t0 + Duration::from_secs(10)).await,
        WorkOutcome::RestartRequired
    );
    assert_eq!(
        summary(&client)[3..],
        [
            format!("GET {}", CONTROLLER),
            format!("GET {}/cancelAction/11", CONTROLLER),
            format!("POST {}/deploymentBase/10/feedback", CONTROLLER),
        ]
    );
    let feedback = client.transport().last_request().json();
    assert_eq!(feedback["id"], "10");
    assert_eq!(feedback["status"]["execution"], "closed");
    assert_eq!(feedback["status"]["result"]["finished"], "success");
    assert!(!client.action().is_active());
    assert!(client.installer().expected.is_none());
}

#[tokio::test]
async fn test_cancel_of_unknown_action_is_adopted() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("cancelAction", &cancel_href(13))]))
        .json(200, &cancel_reply("13", "12"))
        .ok();
    let mut client = client(transport);

    assert_eq!(
        client.tick(Instant::now()).await,
        WorkOutcome::RestartRequired
    );
    let feedback = client.transport().last_request();
    assert_eq!(
        feedback.target(),
        format!("{}/deploymentBase/12/feedback", CONTROLLER)
    );
    assert_eq!(feedback.json()["id"], "12");
    assert_eq!(feedback.json()["status"]["execution"], "closed");
    assert!(!client.action().is_active());
}

#[tokio::test]
async fn test_deployment_ignored_while_action_active() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:00:10", &[("deploymentBase", &deployment_href(5))]))
        .json(200, &deployment_reply("5", "attempt", &artifact_href(), 4))
        .ok()
        .json(200, &poll_reply("00:00:10", &[("deploymentBase", &deployment_href(6))]));
    let mut client = client(transport);
    let t0 = Instant::now();

    client.tick(t0).await;
    client.tick(t0 + Duration::from_secs(10)).await;

    assert_eq!(client.action().id(), 5);
    assert_eq!(client.transport().requests.len(), 4);
    assert!(!client.links().deployment_base.is_empty());
}

#[tokio::test]
async fn test_skip_deployment_is_not_taken_up() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(4))]))
        .json(200, &deployment_reply("4", "skip", &artifact_href(), 4));
    let mut client = client(transport);

    assert_eq!(client.tick(Instant::now()).await, WorkOutcome::Continue);
    assert!(!client.action().is_active());
    assert!(client.links().deployment_base.is_empty());
    assert_eq!(client.transport().requests.len(), 2);
}

#[tokio::test]
async fn test_failed_fetch_consumes_link() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(4))]))
        .refuse();
    let mut client = client(transport);
    let t0 = Instant::now();

    assert_eq!(client.tick(t0).await, WorkOutcome::Continue);
    assert!(client.links().deployment_base.is_empty());
    assert!(!client.action().is_active());

    // Not retried until the next poll
    client.tick(t0 + Duration::from_secs(1)).await;
    assert_eq!(client.transport().requests.len(), 1);
}

#[tokio::test]
async fn test_refused_download_closes_with_failure() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(8))]))
        .json(200, &deployment_reply("8", "forced", &artifact_href(), 4))
        .ok()
        .json(404, "")
        .ok();
    let mut client = client(transport);
    let t0 = Instant::now();

    client.tick(t0).await;
    assert_eq!(
        client.tick(t0 + Duration::from_secs(1)).await,
        WorkOutcome::RestartRequired
    );
    assert_eq!(client.action().result(), ExecutionResult::Failure);
    assert!(client.installer().expected.is_none());

    let feedback = client.transport().last_request().json();
    assert_eq!(feedback["status"]["execution"], "closed");
    assert_eq!(feedback["status"]["result"]["finished"], "failure");
}

#[tokio::test]
async fn test_installer_failure_closes_with_failure() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(8))]))
        .json(200, &deployment_reply("8", "forced", &artifact_href(), 4))
        .ok()
        .binary(b"abcd")
        .ok();
    let installer = MockInstaller {
        fail_on_end: true,
        ..Default::default()
    };
    let mut client = DdiClient::new(identity(CredentialKind::TargetToken), transport, installer);
    let t0 = Instant::now();

    client.tick(t0).await;
    assert_eq!(
        client.tick(t0 + Duration::from_secs(1)).await,
        WorkOutcome::RestartRequired
    );
    assert_eq!(client.action().result(), ExecutionResult::Failure);
    assert_eq!(client.installer().last_error.as_ref().map(|e| e.code()), Some(42));
    assert_eq!(
        client.transport().last_request().json()["status"]["result"]["finished"],
        "failure"
    );
}

#[tokio::test]
async fn test_short_download_closes_with_failure() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(8))]))
        .json(200, &deployment_reply("8", "forced", &artifact_href(), 10))
        .ok()
        .raw(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabcd")
        .ok();
    let mut client = client(transport);
    let t0 = Instant::now();

    client.tick(t0).await;
    assert_eq!(
        client.tick(t0 + Duration::from_secs(1)).await,
        WorkOutcome::RestartRequired
    );
    assert_eq!(client.action().result(), ExecutionResult::Failure);
    assert!(!client.installer().finished);
}

#[tokio::test]
async fn test_authorization_follows_credential_kind() {
    let transport = MockTransport::new().json(200, &poll_reply("00:05:00", &[]));
    let mut client = client(transport);
    client.tick(Instant::now()).await;
    assert_eq!(
        client.transport().last_request().header("Authorization").as_deref(),
        Some("TargetToken s3cret")
    );

    let transport = MockTransport::new().json(200, &poll_reply("00:05:00", &[]));
    let mut client = DdiClient::new(
        identity(CredentialKind::None),
        transport,
        MockInstaller::default(),
    );
    client.tick(Instant::now()).await;
    let poll = client.transport().last_request();
    assert_eq!(poll.header("Authorization"), None);
    assert_eq!(poll.header("Host").as_deref(), Some(HOST));
    assert_eq!(poll.header("Connection").as_deref(), Some("close"));
}

#[tokio::test]
async fn test_every_exchange_closes_the_connection() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(7))]))
        .json(200, &deployment_reply("7", "attempt", &artifact_href(), 4))
        .ok();
    let mut client = client(transport);

    client.tick(Instant::now()).await;
    assert_eq!(client.transport().closes, 3);
}

#[tokio::test]
async fn test_poller_stops_when_restart_required() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[("deploymentBase", &deployment_href(7))]))
        .ok()
        .json(200, &deployment_reply("7", "forced", &artifact_href(), 4))
        .ok()
        .binary(b"abcd")
        .ok();
    let mut client = client(transport);
    let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> =
        Box::pin(std::future::pending());

    let exit = poller::run(
        &poller::Options {
            tick_interval: Duration::from_millis(1),
        },
        &mut client,
        |_| async {},
        &mut shutdown,
    )
    .await;

    assert_eq!(exit, PollerExit::RestartRequired);
    assert_eq!(client.installer().image, b"abcd");
}

#[tokio::test]
async fn test_poller_stops_on_shutdown() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:05:00", &[]))
        .ok();
    let mut client = client(transport);
    let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async {});

    let exit = poller::run(
        &poller::Options {
            tick_interval: Duration::from_secs(3600),
        },
        &mut client,
        tokio::time::sleep,
        &mut shutdown,
    )
    .await;

    assert_eq!(exit, PollerExit::Shutdown);
    assert_eq!(client.transport().requests.len(), 2);
}

#[tokio::test]
async fn test_config_data_pushed_with_caller_mode() {
    let transport = MockTransport::new().ok().ok();
    let mut client = client(transport);
    client.set_config_data(ConfigDataPayload::parse(r#"{"hw":"rev2"}"#).unwrap());

    client.push_config_data(ConfigDataMode::Remove).await;
    let put = client.transport().last_request();
    assert_eq!(put.method(), "PUT");
    assert_eq!(put.target(), format!("{}/configData", CONTROLLER));
    assert_eq!(put.json()["mode"], "remove");
    assert_eq!(put.json()["data"], serde_json::json!({"hw": "rev2"}));

    client.push_config_data(ConfigDataMode::Replace).await;
    assert_eq!(client.transport().last_request().json()["mode"], "replace");
    assert_eq!(client.transport().pending_replies(), 0);
}

#[tokio::test]
async fn test_cancel_with_invalid_stop_id_keeps_client_usable() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:00:10", &[("cancelAction", &cancel_href(13))]))
        .json(200, &cancel_reply("13", "x"))
        .json(200, &poll_reply("00:00:10", &[("deploymentBase", &deployment_href(7))]))
        .json(200, &deployment_reply("7", "forced", &artifact_href(), 4))
        .ok();
    let mut client = client(transport);
    let t0 = Instant::now();

    assert_eq!(client.tick(t0).await, WorkOutcome::Continue);
    assert!(!client.action().is_active());
    assert_eq!(client.action().status(), ExecutionStatus::Closed);
    assert!(!client.action().feedback_dirty());
    assert_eq!(client.transport().requests.len(), 2);

    assert_eq!(
        client.tick(t0 + Duration::from_secs(10)).await,
        WorkOutcome::Continue
    );
    assert_eq!(client.action().id(), 7);
    assert_eq!(client.action().status(), ExecutionStatus::Proceeding);
    assert_eq!(
        client.transport().last_request().target(),
        format!("{}/deploymentBase/7/feedback", CONTROLLER)
    );
}

#[tokio::test]
async fn test_deployment_with_invalid_id_keeps_client_usable() {
    let transport = MockTransport::new()
        .json(200, &poll_reply("00:00:10", &[("deploymentBase", &deployment_href(1))]))
        .json(200, &deployment_reply("abc", "forced", &artifact_href(), 4))
        .json(200, &poll_reply("00:00:10", &[("deploymentBase", &deployment_href(8))]))
        .json(200, &deployment_reply("8", "forced", &artifact_href(), 4))
        .ok();
    let mut client = client(transport);
    let t0 = Instant::now();

    assert_eq!(client.tick(t0).await, WorkOutcome::Continue);
    assert!(!client.action().is_active());
    assert_eq!(client.action().status(), ExecutionStatus::Closed);
    assert!(!client.action().feedback_dirty());

    client.tick(t0 + Duration::from_secs(10)).await;
    assert_eq!(client.action().id(), 8);
    assert_eq!(client.action().status(), ExecutionStatus::Proceeding);
    assert_eq!(client.transport().pending_replies(), 0);
}

#[tokio::test]
async fn test_cancel_in_same_poll_reports_only_the_close() {
    let transport = MockTransport::new()
        .json(
            200,
            &poll_reply(
                "00:05:00",
                &[
                    ("deploymentBase", &deployment_href(10)),
                    ("cancelAction", &cancel_href(11)),
                ],
            ),
        )
        .json(200, &deployment_reply("10", "attempt", &artifact_href(), 4))
        .json(200, &cancel_reply("11", "10"))
        .ok();
    let mut client = client(transport);

    assert_eq!(
        client.tick(Instant::now()).await,
        WorkOutcome::RestartRequired
    );

    // The "scheduled" step is superseded before it is reported
    let feedback: Vec<_> = client
        .transport()
        .requests
        .iter()
        .filter(|r| r.method() == "POST")
        .map(|r| r.json())
        .collect();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0]["status"]["execution"], "closed");
    assert_eq!(feedback[0]["status"]["result"]["finished"], "success");
}
