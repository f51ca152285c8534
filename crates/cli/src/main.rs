//! CLI tool for building carousel presentations from generated content.

use anyhow::{Context, Result};
use carousel_core::{
    ColorVariant, ContentStyle, ErrorReport, Language, OverflowPolicy, TemplateSelector,
};
use carousel_pptx::{list_templates, DeckInspector, DeckPipeline, SlideAssembler, TemplateRegistry};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Build PowerPoint carousels from generated slide content.
#[derive(Parser, Debug)]
#[command(name = "carousel")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in templates
    Templates {
        /// Template language (en, es-hn)
        #[arg(short, long)]
        language: Option<Language>,
    },

    /// Build a presentation from a content file ("-" reads stdin)
    Assemble {
        content: PathBuf,

        /// Built-in template id, e.g. en-light or es-hn-ocean
        #[arg(short, long, default_value = "en-light", conflicts_with = "upload")]
        template: String,

        /// Use a .pptx file as the template
        #[arg(short, long)]
        upload: Option<PathBuf>,

        /// Language of the uploaded template's text
        #[arg(short, long, default_value = "en")]
        language: Language,

        /// Content style: bullets, paragraph or mixed
        #[arg(short, long, default_value = "bullets")]
        style: ContentStyle,

        /// What to do with text that does not fit: shrink or truncate
        #[arg(long, default_value = "shrink")]
        overflow: OverflowPolicy,

        /// Text for footer placeholders
        #[arg(long)]
        footer: Option<String>,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory holding built-in templates as <id>.pptx
        #[arg(long)]
        templates_dir: Option<PathBuf>,

        /// Print the result (or the error) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the slides of a .pptx file
    Inspect {
        file: PathBuf,

        /// Print the slides as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match args.command {
        Command::Templates { language } => print_templates(language),
        Command::Assemble {
            content,
            template,
            upload,
            language,
            style,
            overflow,
            footer,
            output,
            templates_dir,
            json,
        } => {
            let mut registry = TemplateRegistry::new();
            if let Some(dir) = templates_dir {
                registry = registry.with_templates_dir(dir);
            }

            let mut assembler = SlideAssembler::new().with_overflow_policy(overflow);
            if let Some(footer) = footer {
                assembler = assembler.with_footer_text(footer);
            }

            let selector = match upload {
                Some(path) => uploaded_selector(&path, language)?,
                None => TemplateSelector::from_builtin_id(&template)
                    .ok_or_else(|| anyhow::anyhow!("Unknown template '{}'", template))?,
            };

            let content = read_content(&content)?;
            let pipeline = DeckPipeline::with_registry(&registry).with_assembler(assembler);

            match pipeline.assemble(&content, &selector, style) {
                Ok(deck) => {
                    let output_path = get_output_path(output.as_ref(), &deck.filename)?;
                    write_output(&output_path, &deck.bytes)?;

                    if json {
                        println!("{}", serde_json::to_string_pretty(&deck)?);
                    } else {
                        for warning in &deck.warnings {
                            eprintln!("warning: {}", warning);
                        }
                        println!("{} ({} slides)", output_path.display(), deck.slide_count);
                    }
                    Ok(())
                }
                Err(e) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&ErrorReport::from(&e))?);
                    }
                    let message = e.user_message();
                    Err(anyhow::Error::new(e).context(message))
                }
            }
        }
        Command::Inspect { file, json } => inspect_file(&file, json),
    }
}

fn print_templates(language: Option<Language>) -> Result<()> {
    let languages = match language {
        Some(language) => vec![language],
        None => Language::ALL.to_vec(),
    };

    for language in languages {
        for template in list_templates(language) {
            println!("{:<14} {}", template.id, template.color_variant);
        }
    }

    Ok(())
}

/// Selector for an uploaded template file.
fn uploaded_selector(path: &Path, language: Language) -> Result<TemplateSelector> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("template.pptx");

    log::debug!("Using uploaded template {}", path.display());
    Ok(TemplateSelector::uploaded(filename, language, bytes))
}

/// Read generated content from a file, or stdin for `-`.
fn read_content(path: &Path) -> Result<String> {
    let mut content = String::new();

    if path == Path::new("-") {
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read content from stdin")?;
    } else {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        BufReader::new(file)
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to read {}", path.display()))?;
    }

    Ok(content)
}

fn inspect_file(path: &Path, json: bool) -> Result<()> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let slides = DeckInspector::new()
        .inspect(BufReader::new(file))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&slides)?);
        return Ok(());
    }

    for slide in &slides {
        println!(
            "Slide {} [{}]",
            slide.number,
            slide.layout.as_deref().unwrap_or("no layout")
        );
        for shape in &slide.shapes {
            if shape.paragraphs.iter().all(|p| p.text.is_empty()) {
                continue;
            }
            println!(
                "  {} ({})",
                shape.name,
                shape.placeholder_type.as_deref().unwrap_or("text box")
            );
            for paragraph in &shape.paragraphs {
                let marker = if paragraph.bulleted { "•" } else { " " };
                println!("    {} {}", marker, paragraph.text);
            }
        }
    }

    Ok(())
}

/// Determine the output path for a presentation.
fn get_output_path(output_dir: Option<&PathBuf>, filename: &str) -> Result<PathBuf> {
    let output_path = match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.join(filename)
        }
        None => PathBuf::from(filename),
    };

    Ok(output_path)
}

/// Write output to a file.
fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(bytes)
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}
