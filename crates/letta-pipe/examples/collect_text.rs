use letta_pipe::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = Client::builder()
        .config(LettaConfig::from_env()?)
        .build()?;

    let answer = client
        .run(vec![Message::user("Say hello in one short sentence.")])
        .collect_text()
        .await?;

    println!("{answer}");
    Ok(())
}
