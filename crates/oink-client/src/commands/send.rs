//! One-shot send commands.
//!
//! These run the exchange on the calling thread so the process does not exit
//! before the request is written.

use oink_core::{Address, Payload};
use oink_protocol::Request;

use crate::config::ClientConfig;
use crate::dispatcher::{ClientDispatcher, Outgoing};
use crate::error::ClientResult;

/// Send a text message, or the text as opaque bytes.
pub fn message(config: &ClientConfig, to: &Address, text: String, binary: bool) -> ClientResult<()> {
    let outgoing = if binary {
        Outgoing::binary(text.into_bytes())
    } else {
        Request::message(Payload::new(to.clone(), config.address(), text)).into()
    };
    ClientDispatcher::new(config.dispatch.poll_interval()).try_send(to, &outgoing)?;
    println!("Sent to {}", to);
    Ok(())
}

/// Send a search request; the answer is logged at info level.
pub fn search(config: &ClientConfig, to: &Address, query: String) -> ClientResult<()> {
    ClientDispatcher::new(config.dispatch.poll_interval())
        .try_send(to, &Request::search(query).into())
}
