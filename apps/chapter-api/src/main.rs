use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = chapter_api::Args::parse();

	chapter_api::run(args).await
}
