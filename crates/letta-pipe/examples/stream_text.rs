use std::sync::Arc;

use letta_pipe::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = Client::builder()
        .config(LettaConfig::from_env()?)
        .build()?;

    let (sink, mut events) = ChannelSink::new();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SinkEvent::Reasoning { step, content } => eprintln!("[{step}] {content}"),
                SinkEvent::Usage(stats) => eprintln!("usage: {stats}"),
                SinkEvent::Warning { message, .. } => eprintln!("warning: {message}"),
                _ => {}
            }
        }
    });

    let mut run = client
        .run(vec![Message::user("Stream a greeting.")])
        .sink(Arc::new(sink))
        .start_stream()
        .await?;

    while let Some(event) = run.next_event().await {
        match event {
            StreamEvent::OutputDelta { text, .. } => print!("{text}"),
            StreamEvent::Completed { .. } => println!(),
            StreamEvent::Error { error, .. } => eprintln!("run error: {error}"),
            StreamEvent::RunStarted { .. } => {}
        }
    }

    let _ = run.finish().await?;
    forwarder.abort();
    Ok(())
}
