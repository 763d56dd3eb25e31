//! Log setup: diagnostics go to stderr so command output stays parseable.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Checked before `RUST_LOG`.
pub const LOG_ENV: &str = "DEVPI_LOG";

/// Pick a filter. `-v`/`-q` win over the environment.
pub fn filter(verbose: u8, quiet: bool, env: Option<String>) -> EnvFilter {
    let directives = match (quiet, verbose) {
        (true, _) => "error".to_string(),
        (false, 0) => match env {
            Some(spec) if !spec.trim().is_empty() => spec,
            _ => "warn".to_string(),
        },
        (false, 1) => "warn,devpi_client=debug,devpi_api=debug".to_string(),
        (false, _) => "trace".to_string(),
    };
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Registry with `filter` and a fmt layer writing to `writer`.
pub fn subscriber<W>(filter: EnvFilter, writer: W) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer))
}

pub fn init(verbose: u8, quiet: bool) {
    let env = std::env::var(LOG_ENV)
        .ok()
        .or_else(|| std::env::var(EnvFilter::DEFAULT_ENV).ok());

    let _ = subscriber(filter(verbose, quiet, env), std::io::stderr).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use devpi_client::transport::{Request, Response};
    use devpi_client::{Client, Credentials, Transport};
    use serde_json::json;
    use tracing::level_filters::LevelFilter;

    /// Answers every request with `status`.
    struct FixedStatus(u16);

    impl Transport for FixedStatus {
        fn send(
            &self,
            _request: &Request,
            _credentials: Option<&Credentials>,
        ) -> devpi_client::Result<Response> {
            Ok(Response::json(self.0, &json!({"result": {"root": {}}})))
        }
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `op` against a client under `filter` and return what was logged.
    fn logged(filter: EnvFilter, status: u16, op: impl FnOnce(&Client)) -> String {
        let sink = Sink::default();
        let writer = sink.clone();
        let client = Client::with_transport("http://devpi.test", Box::new(FixedStatus(status))).unwrap();
        tracing::subscriber::with_default(subscriber(filter, move || writer.clone()), || {
            op(&client)
        });
        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn default_is_warn() {
        assert_eq!(filter(0, false, None).max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(filter(1, false, None).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(filter(2, false, None).max_level_hint(), Some(LevelFilter::TRACE));
        assert_eq!(filter(0, true, None).max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn env_used_without_flags() {
        let f = filter(0, false, Some("devpi_client=trace".into()));
        assert_eq!(f.max_level_hint(), Some(LevelFilter::TRACE));

        let f = filter(0, true, Some("trace".into()));
        assert_eq!(f.max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn bad_env_falls_back_to_warn() {
        let f = filter(0, false, Some("devpi_client=loud".into()));
        assert_eq!(f.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn verbose_shows_request_diagnostics() {
        let out = logged(filter(1, false, None), 200, |client| {
            client.server_info().unwrap();
        });
        assert!(out.contains("request succeeded"), "{out}");

        let out = logged(filter(0, false, None), 200, |client| {
            client.server_info().unwrap();
        });
        assert!(!out.contains("request succeeded"), "{out}");
    }

    #[test]
    fn absent_user_is_not_logged_as_error() {
        let out = logged(filter(0, false, None), 404, |client| {
            assert!(!client.user().exists("ghost").unwrap());
        });
        assert!(out.is_empty(), "{out}");

        let out = logged(filter(1, false, None), 404, |client| {
            assert!(!client.user().exists("ghost").unwrap());
        });
        assert!(out.contains("resource not found"), "{out}");
    }

    #[test]
    fn server_failures_still_log_at_default() {
        let out = logged(filter(0, false, None), 502, |client| {
            assert!(client.server_info().is_err());
        });
        assert!(out.contains("request failed"), "{out}");
    }
}
