use bytes::BytesMut;
use emberdb::command::{Command, CommandError};
use emberdb::protocol::{self, Value};
use emberdb::store::Store;

fn eval(name: &str, args: &[&str]) -> Result<Value, CommandError> {
    let cmd = Command {
        name: name.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
    };
    cmd.eval(&Store::new())
}

fn encoded(value: &Value) -> Vec<u8> {
    let mut out = BytesMut::new();
    protocol::encode(value, &mut out).unwrap();
    out.to_vec()
}

#[test]
fn ping_without_args_replies_pong() {
    let value = eval("ping", &[]).unwrap();
    assert_eq!(encoded(&value), b"+PONG\r\n");
}

#[test]
fn ping_with_one_arg_echoes_it() {
    let value = eval("ping", &["hello"]).unwrap();
    assert_eq!(encoded(&value), b"$5\r\nhello\r\n");
}

#[test]
fn ping_with_two_args_is_an_arity_error() {
    let err = eval("ping", &["a", "b"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "ERR wrong number of arguments for 'ping' command"
    );
}

#[test]
fn arity_error_renders_uppercase_verbs_lowercase() {
    let err = eval("PING", &["a", "b"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "ERR wrong number of arguments for 'ping' command"
    );
}

#[test]
fn unknown_command_is_an_explicit_error() {
    let err = eval("FLY", &["me"]).unwrap_err();
    assert_eq!(err, CommandError::UnknownCommand("FLY".to_string()));
    assert_eq!(err.to_string(), "ERR unknown command 'FLY'");
}

#[test]
fn error_replies_use_the_resp_error_form() {
    let err = eval("ping", &["a", "b"]).unwrap_err();
    let mut out = BytesMut::new();
    protocol::write_error(&err.to_string(), &mut out);
    assert_eq!(
        &out[..],
        b"-ERR wrong number of arguments for 'ping' command\r\n".as_slice()
    );
}
