//! Foreground listener.

use std::time::Duration;

use tracing::{info, warn};

use crate::commands::render_inbound;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::node::Node;

/// How often the inbox is drained.
const INBOX_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Grace period for queued sends on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Listen and print received payloads until Ctrl-C.
pub fn listen(config: &ClientConfig, scan: bool) -> ClientResult<()> {
    let mut node = Node::from_config(config)?;
    node.start_listening();
    if !node.is_listening() {
        return Err(ClientError::NotListening(node.address().to_string()));
    }
    println!("Listening on {} as {}", node.address(), node.nickname());

    let hosts = config.discovery.scan_range();
    let scan_interval = config.discovery.scan_interval();

    node.dispatcher().block_on(async {
        let mut inbox_tick = tokio::time::interval(INBOX_POLL_INTERVAL);
        let mut scan_tick = tokio::time::interval(scan_interval);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        warn!(error = %e, "failed to wait for Ctrl-C");
                    }
                    info!("interrupted, shutting down");
                    break;
                }
                _ = inbox_tick.tick() => {
                    for inbound in node.poll_inbound() {
                        println!("{}", render_inbound(&inbound));
                    }
                }
                _ = scan_tick.tick(), if scan => {
                    node.scan(hosts.clone());
                }
            }
        }
    });

    node.shutdown(SHUTDOWN_GRACE);
    Ok(())
}
