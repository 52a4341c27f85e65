// tests/output_and_signals.rs

use wsrun::exec::{DecodeOptions, KillSignal, OutputChunk, StreamName, strip_ansi};

#[test]
fn chunks_keep_raw_bytes_and_decode_lossily() {
    let chunk = OutputChunk::new(StreamName::Stderr, b"ok \xff\n".to_vec());

    assert_eq!(chunk.stream(), StreamName::Stderr);
    assert_eq!(chunk.raw(), b"ok \xff\n");
    assert_eq!(chunk.decode(DecodeOptions::default()), "ok \u{fffd}\n");
}

#[test]
fn sanitized_text_strips_ansi_escapes() {
    let chunk = OutputChunk::new(
        StreamName::Stdout,
        "\x1b[1;32mPASS\x1b[0m \x1b]8;;https://example.com\x07link\x1b]8;;\x07\n",
    );

    assert_eq!(chunk.sanitized_text(), "PASS link\n");
    assert!(chunk.decode(DecodeOptions { strip_ansi: false }).contains("\x1b[1;32m"));
}

#[test]
fn strip_ansi_borrows_plain_text() {
    assert!(matches!(strip_ansi("plain"), std::borrow::Cow::Borrowed("plain")));
    assert_eq!(strip_ansi("\x1b[2K\x1b[1Gdone"), "done");
}

#[test]
fn signals_parse_from_names_and_numbers() {
    assert_eq!("SIGINT".parse::<KillSignal>().unwrap(), KillSignal::Interrupt);
    assert_eq!("term".parse::<KillSignal>().unwrap(), KillSignal::Terminate);
    assert_eq!(" sigkill ".parse::<KillSignal>().unwrap(), KillSignal::Kill);
    assert_eq!("9".parse::<KillSignal>().unwrap(), KillSignal::Number(9));

    assert!("0".parse::<KillSignal>().is_err());
    assert!("SIGNOPE".parse::<KillSignal>().is_err());
}

#[test]
fn signals_display_posix_names() {
    assert_eq!(KillSignal::Interrupt.to_string(), "SIGINT");
    assert_eq!(KillSignal::default().to_string(), "SIGTERM");
}

#[cfg(unix)]
#[test]
fn signal_numbers_follow_the_platform() {
    assert_eq!(KillSignal::Interrupt.number(), Some(2));
    assert_eq!(KillSignal::Kill.number(), Some(9));
    assert_eq!(KillSignal::Number(15).to_string(), "SIGTERM");
}

#[cfg(unix)]
#[test]
fn signal_exit_codes_are_128_plus_signo() {
    assert_eq!(KillSignal::Interrupt.exit_code(), 130);
    assert_eq!(KillSignal::Hangup.exit_code(), 129);
    assert_eq!(KillSignal::User1.exit_code(), 138);
}
