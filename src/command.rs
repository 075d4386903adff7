/*!
 * Command model and dispatch
 *
 * A decoded request becomes a [`Command`]: the verb plus its positional
 * arguments. Evaluation dispatches on the upper-cased verb name; every
 * handler is a pure function over the arguments and the shared store
 * handle, so new data verbs plug in here without touching the transport
 * or protocol layers.
 */

use crate::protocol::Value;
use crate::store::Store;
use bytes::Bytes;
use thiserror::Error;

/// Failures surfaced to the client as RESP error replies.
///
/// These are per-request and recoverable: the connection stays open and
/// the next request is processed normally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),
}

/// One client request: the verb and its arguments, in wire order.
///
/// Commands are transient; one is built per request and discarded after
/// evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    /// Build a command from a decoded token sequence.
    ///
    /// An empty sequence (`*0\r\n` on the wire) carries no command and
    /// warrants no reply.
    pub fn from_tokens(tokens: Vec<String>) -> Option<Command> {
        let mut tokens = tokens.into_iter();
        let name = tokens.next()?;
        Some(Command {
            name,
            args: tokens.collect(),
        })
    }

    /// Evaluate the command against the shared store.
    ///
    /// Dispatch is case-insensitive: the verb is matched against an
    /// upper-cased table. Unrecognized verbs are an explicit error.
    pub fn eval(&self, store: &Store) -> Result<Value, CommandError> {
        match self.name.to_ascii_uppercase().as_str() {
            "PING" => ping(&self.args, store),
            _ => Err(CommandError::UnknownCommand(self.name.clone())),
        }
    }
}

/// PING, the liveness verb: no arguments replies `+PONG`; one argument is
/// echoed back as a bulk string.
fn ping(args: &[String], _store: &Store) -> Result<Value, CommandError> {
    match args {
        [] => Ok(Value::Simple("PONG".to_string())),
        [msg] => Ok(Value::Bulk(Bytes::copy_from_slice(msg.as_bytes()))),
        // Redis renders the verb lowercase in arity errors.
        _ => Err(CommandError::WrongArity("ping".to_string())),
    }
}
