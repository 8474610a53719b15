//! CLI for GenFrame - prompt-to-image generation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genframe::{
    AspectRatio, FileStore, GoogleClient, HistoryCache, HistoryEntry, ImageFormat, ReferenceImage,
    Settings, Studio, StudioEvent, StylePreset, Theme,
};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_STORE: &str = ".genframe/store.json";

#[derive(Parser)]
#[command(name = "genframe")]
#[command(about = "Generate images from text prompts (Imagen, Gemini) with local history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API key (falls back to GOOGLE_API_KEY / GEMINI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Path of the preferences and history store
    #[arg(long, global = true, env = "GENFRAME_STORE", default_value = DEFAULT_STORE)]
    store: PathBuf,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// Inspect or edit the generation history
    #[command(subcommand)]
    History(HistoryCommand),

    /// Show or change saved preferences
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// List available style presets
    Styles,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Reference image to condition on (disables --aspect-ratio)
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Aspect ratio, saved as the new default
    #[arg(long, value_enum)]
    aspect_ratio: Option<AspectRatioArg>,

    /// Style preset, saved as the new default
    #[arg(long)]
    style: Option<String>,

    /// Where to save the image
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output encoding for text-only prompts (defaults to the --output extension, then jpeg)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List entries, newest first
    List,
    /// Show one entry and restore its settings
    Show { index: usize },
    /// Save an entry's image to a file
    Save { index: usize, output: PathBuf },
    /// Delete one entry
    Delete { index: usize },
    /// Delete every entry
    Clear,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print current preferences
    Show,
    /// Change preferences
    Set {
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
        #[arg(long, value_enum)]
        aspect_ratio: Option<AspectRatioArg>,
        #[arg(long)]
        style: Option<String>,
    },
    /// Switch between light and dark
    ToggleTheme,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
    Webp,
}

impl From<FormatArg> for ImageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg => ImageFormat::Jpeg,
            FormatArg::Webp => ImageFormat::WebP,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "3:4")]
    StandardPortrait,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "16:9")]
    Landscape,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::StandardPortrait => AspectRatio::StandardPortrait,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = Arc::new(FileStore::open(&cli.store)?);

    match cli.command {
        Commands::Generate(args) => {
            let mut client = GoogleClient::builder();
            if let Some(key) = cli.api_key {
                client = client.api_key(key);
            }
            let studio = Studio::open(client.build()?, store)?;
            generate(studio, args, cli.json).await?;
        }
        Commands::History(command) => history(store, command, cli.json)?,
        Commands::Settings(command) => settings(store, command, cli.json)?,
        Commands::Styles => list_styles(cli.json)?,
    }

    Ok(())
}

async fn generate(
    studio: Studio<GoogleClient>,
    args: GenerateArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    if args.reference.is_some() && args.aspect_ratio.is_some() {
        anyhow::bail!("--aspect-ratio is not supported together with --reference");
    }
    let format = args
        .format
        .map(ImageFormat::from)
        .or_else(|| args.output.as_deref().and_then(ImageFormat::from_path))
        .unwrap_or_default();
    let mut studio = studio.with_output_format(format);
    if let Some(ratio) = args.aspect_ratio {
        studio.set_aspect_ratio(ratio.into())?;
    }
    if let Some(ref style) = args.style {
        studio.set_style(style.parse::<StylePreset>()?)?;
    }

    let reference = args
        .reference
        .as_ref()
        .map(ReferenceImage::from_file)
        .transpose()?;

    let mut events = studio.subscribe();
    let entry = match studio.generate(&args.prompt, reference).await {
        Ok(entry) => entry,
        Err(e) => {
            if let Ok(StudioEvent::CredentialsRejected { .. }) = events.try_recv() {
                eprintln!("Set a valid key with --api-key or the GOOGLE_API_KEY environment variable.");
            }
            anyhow::bail!("{e}");
        }
    };

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(entry.result.file_name("genframe")));
    entry.result.save(&output)?;

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": output.display().to_string(),
            "mime_type": entry.result.mime_type(),
            "prompt": entry.prompt,
            "aspect_ratio": entry.aspect_ratio,
            "style": entry.style_label,
            "history_size": studio.history().len(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Generated image: {} ({})", output.display(), entry.result.mime_type());
    }

    Ok(())
}

fn history(store: Arc<FileStore>, command: HistoryCommand, json_output: bool) -> anyhow::Result<()> {
    let mut cache = HistoryCache::load(store.clone())?;
    match command {
        HistoryCommand::List => {
            if json_output {
                let rows: Vec<_> = cache.list().iter().map(summary).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if cache.is_empty() {
                println!("History is empty.");
            } else {
                for (i, entry) in cache.list().iter().enumerate() {
                    let reference = if entry.reference_image_uri.is_some() { " [ref]" } else { "" };
                    println!(
                        "{i:>2}. {} ({}, {}){reference}",
                        entry.prompt, entry.aspect_ratio, entry.style_label
                    );
                }
            }
        }
        HistoryCommand::Show { index } => {
            let entry = cache.restore(index)?;
            // Restoring an entry brings its choices back as the new defaults.
            Settings::load(store.as_ref())?
                .with_entry(&entry)
                .save(store.as_ref())?;

            if json_output {
                println!("{}", serde_json::to_string_pretty(&summary(&entry))?);
            } else {
                println!("Prompt:       {}", entry.prompt);
                println!("Aspect ratio: {}", entry.aspect_ratio);
                println!("Style:        {}", entry.style_label);
                println!("Format:       {}", entry.result.mime_type());
            }
        }
        HistoryCommand::Save { index, output } => {
            let entry = cache.restore(index)?;
            entry.result.save(&output)?;
            println!("Saved {}", output.display());
        }
        HistoryCommand::Delete { index } => {
            let removed = cache.delete(index)?;
            println!("Deleted \"{}\"", removed.prompt);
        }
        HistoryCommand::Clear => {
            cache.clear()?;
            println!("History cleared.");
        }
    }
    Ok(())
}

fn summary(entry: &HistoryEntry) -> serde_json::Value {
    serde_json::json!({
        "prompt": entry.prompt,
        "aspect_ratio": entry.aspect_ratio,
        "style": entry.style_label,
        "mime_type": entry.result.mime_type(),
        "has_reference": entry.reference_image_uri.is_some(),
    })
}

fn settings(store: Arc<FileStore>, command: SettingsCommand, json_output: bool) -> anyhow::Result<()> {
    let mut current = Settings::load(store.as_ref())?;
    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Set {
            theme,
            aspect_ratio,
            style,
        } => {
            if let Some(theme) = theme {
                current.theme = theme.into();
            }
            if let Some(ratio) = aspect_ratio {
                current.aspect_ratio = ratio.into();
            }
            if let Some(style) = style {
                current.style = style.parse()?;
            }
            current.save(store.as_ref())?;
        }
        SettingsCommand::ToggleTheme => {
            current.theme = current.theme.toggled();
            current.save(store.as_ref())?;
        }
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&current)?);
    } else {
        println!("Theme:        {}", current.theme);
        println!("Aspect ratio: {}", current.aspect_ratio);
        println!("Style:        {}", current.style);
    }
    Ok(())
}

fn list_styles(json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let styles: Vec<_> = StylePreset::ALL
            .iter()
            .map(|s| serde_json::json!({ "label": s.label(), "modifier": s.modifier() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&styles)?);
    } else {
        println!("Available styles:\n");
        for style in StylePreset::ALL {
            match style.modifier() {
                Some(modifier) => println!("  {:<15} {}", style.label(), modifier),
                None => println!("  {:<15} (prompt unchanged)", style.label()),
            }
        }
    }
    Ok(())
}
