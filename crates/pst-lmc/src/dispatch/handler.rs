//! Connection handler that dispatches control requests.
//!
//! The handler reads one request line, runs it against the shared
//! [`ControlService`], and writes the answer. Monitor requests keep the
//! connection open and stream samples until the service ends the stream.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use pst_lmc_types::{MonitorData, RpcError, RpcRequest};
use tracing::{debug, warn};

use crate::service::{ControlService, MonitorOutcome, MonitorSink};
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::{parse_request, read_request_line};
use super::response::ResponseWriter;

/// Connection handler that parses and dispatches JSONL requests.
pub struct DispatchConnectionHandler {
    service: Arc<ControlService>,
}

impl DispatchConnectionHandler {
    /// Creates a handler serving `service`.
    pub fn new(service: Arc<ControlService>) -> Self {
        Self { service }
    }

    fn dispatch(&self, mut stream: ConnectionStream) {
        let request = match read_request_line(&mut stream)
            .and_then(|line| line.map(|bytes| parse_request(&bytes)).transpose())
        {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(target: DISPATCH_TARGET, "client disconnected without request");
                return;
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "unreadable request");
                report(ResponseWriter::new(&mut stream).write_error(error.to_rpc_error()));
                return;
            }
        };

        debug!(target: DISPATCH_TARGET, rpc = request.name(), "dispatching request");
        let mut writer = ResponseWriter::new(&mut stream);
        match request {
            RpcRequest::Monitor {
                polling_interval_ms,
            } => self.stream_monitor(polling_interval_ms, &mut writer),
            unary => report(writer.write_result(self.service.handle(unary))),
        }
    }

    fn stream_monitor(
        &self,
        polling_interval_ms: u64,
        writer: &mut ResponseWriter<&mut ConnectionStream>,
    ) {
        if polling_interval_ms == 0 {
            report(writer.write_error(RpcError::invalid_argument(
                "polling_interval_ms must be positive",
            )));
            return;
        }
        let interval = Duration::from_millis(polling_interval_ms);
        let outcome = {
            let mut sink = StreamSink { writer: &mut *writer };
            self.service.monitor(interval, &mut sink)
        };
        match outcome {
            Ok(MonitorOutcome::Completed) => report(writer.write_stream_end()),
            Ok(MonitorOutcome::Cancelled | MonitorOutcome::Disconnected) => {}
            Err(error) => report(writer.write_error(error)),
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.dispatch(stream);
    }
}

/// Adapts a connection's response writer to the monitor loop.
struct StreamSink<'a, 'b> {
    writer: &'a mut ResponseWriter<&'b mut ConnectionStream>,
}

impl MonitorSink for StreamSink<'_, '_> {
    fn is_cancelled(&mut self) -> bool {
        self.writer.get_mut().peer_closed()
    }

    fn send(&mut self, data: &MonitorData) -> io::Result<()> {
        self.writer.write_monitor(data).map_err(|error| match error {
            DispatchError::Io(source) => source,
            other => io::Error::other(other),
        })
    }
}

fn report(result: Result<(), DispatchError>) {
    if let Err(error) = result {
        debug!(target: DISPATCH_TARGET, %error, "failed to write response");
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    use pst_lmc_types::{ErrorCode, ObsState, RpcStatus, ServerMessage};
    use rstest::{fixture, rstest};

    use crate::tests::support::{RecordingHealthReporter, managed_service};

    use super::*;

    struct HandlerTestHarness {
        client: TcpStream,
        server_handle: JoinHandle<()>,
    }

    impl HandlerTestHarness {
        fn send_and_collect(mut self, request: &[u8]) -> Vec<ServerMessage> {
            self.client.write_all(request).expect("write request");
            self.client.flush().expect("flush");

            let reader = BufReader::new(&mut self.client);
            let messages = reader
                .lines()
                .map(|line| serde_json::from_str(&line.expect("read line")).expect("decode"))
                .collect();
            self.server_handle.join().expect("server join");
            messages
        }
    }

    #[fixture]
    fn service() -> Arc<ControlService> {
        managed_service(Arc::new(RecordingHealthReporter::default()))
    }

    fn harness(service: Arc<ControlService>) -> HandlerTestHarness {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server_handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            DispatchConnectionHandler::new(service).handle(ConnectionStream::Tcp(stream));
        });
        let client = TcpStream::connect(addr).expect("connect");
        HandlerTestHarness {
            client,
            server_handle,
        }
    }

    fn single_error(messages: &[ServerMessage]) -> &RpcError {
        match messages {
            [ServerMessage::Error { error }] => error,
            other => panic!("expected one error line, got {other:?}"),
        }
    }

    #[rstest]
    fn unary_call_gets_one_response(service: Arc<ControlService>) {
        let messages = harness(service).send_and_collect(b"{\"rpc\":\"get_state\"}\n");
        assert!(matches!(
            messages.as_slice(),
            [ServerMessage::Response { result: pst_lmc_types::RpcResponse::State(ObsState::Empty) }]
        ));
    }

    #[rstest]
    fn malformed_line_gets_invalid_argument(service: Arc<ControlService>) {
        let messages = harness(service).send_and_collect(b"not valid json\n");
        let error = single_error(&messages);
        assert_eq!(error.status, RpcStatus::InvalidArgument);
        assert_eq!(error.code, ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn rejected_call_reports_its_code(service: Arc<ControlService>) {
        let messages = harness(service).send_and_collect(b"{\"rpc\":\"stop_scan\"}\n");
        assert_eq!(single_error(&messages).code, ErrorCode::NotScanning);
    }

    #[rstest]
    fn monitor_outside_scanning_is_rejected(service: Arc<ControlService>) {
        let messages =
            harness(service).send_and_collect(b"{\"rpc\":\"monitor\",\"polling_interval_ms\":5}\n");
        assert_eq!(single_error(&messages).code, ErrorCode::NotScanning);
    }

    #[rstest]
    fn monitor_streams_until_the_scan_stops(service: Arc<ControlService>) {
        service
            .configure_beam(&pst_lmc_types::ConfigRecord::new().with("BEAM_ID", 1), false)
            .expect("beam");
        service
            .configure_scan(&pst_lmc_types::ConfigRecord::new(), false)
            .expect("scan");
        service
            .start_scan(&pst_lmc_types::ConfigRecord::new().with("SCAN_ID", 9))
            .expect("start");

        let stopper = {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(80));
                service.stop_scan().expect("stop");
            })
        };
        let messages = harness(Arc::clone(&service))
            .send_and_collect(b"{\"rpc\":\"monitor\",\"polling_interval_ms\":10}\n");
        stopper.join().expect("stopper");

        let (last, samples) = messages.split_last().expect("at least one line");
        assert_eq!(last, &ServerMessage::StreamEnd);
        assert!(!samples.is_empty());
        assert!(
            samples
                .iter()
                .all(|message| matches!(message, ServerMessage::Monitor { .. }))
        );
    }
}
