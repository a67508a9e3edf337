use futures::stream;
use planner_stream::prelude::*;
use planner_stream::{ConsumeError, consume};

const BODY: &str = "progress:0\nmessage:Picking neighbourhoods\nprogress:50\nmessage:Ordering days ☀\n{\"content\":\"3 days in Lisbon\"}\nprogress:100\n";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ConsumeError> {
    // Small chunks so lines and characters straddle chunk boundaries.
    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = BODY
        .as_bytes()
        .chunks(7)
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();

    let mut state = StreamState::new();
    let mut sink = |percent: u8, message: Option<&str>| match message {
        Some(message) => println!("[{percent:>3}%] {message}"),
        None => println!("[{percent:>3}%]"),
    };
    let outcome = consume(
        Some(stream::iter(chunks)),
        &mut state,
        &mut sink,
        &CancelToken::new(),
    )
    .await?;

    println!("{outcome:?}");
    println!("log: {:?}", state.log_lines);
    Ok(())
}
