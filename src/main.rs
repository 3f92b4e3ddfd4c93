use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lecture_scribe::chunking::{group, segment, ChunkStats};
use lecture_scribe::cli::{Cli, Commands};
use lecture_scribe::config::Config;
use lecture_scribe::pipeline::{PipelineOutput, SummaryPipeline, ValidationVerdict};
use lecture_scribe::sources::{LocalFileSource, SpeechToTextSource, TranscriptAcquirer};
use lecture_scribe::{output, qa, utils, StageAgents};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "lecture_scribe=debug"
    } else {
        "lecture_scribe=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Summarize {
            input,
            output,
            format,
            language,
            translate_to,
            chunking,
            concurrency,
            on_failure,
            no_validate,
            no_speech_fallback,
        } => {
            let config = Config::load().await?;

            let mut settings = config.pipeline.clone();
            chunking.apply(&mut settings);
            if let Some(concurrency) = concurrency {
                settings.max_concurrency = concurrency;
            }
            if let Some(policy) = on_failure {
                settings.failure_policy = policy;
            }
            if no_validate {
                settings.validate = false;
            }
            if translate_to.is_some() {
                settings.translate_to = translate_to.clone();
            }
            settings.check().context("Invalid pipeline settings")?;

            let speech_fallback = config.app.speech_fallback && !no_speech_fallback;
            let speech = speech_fallback.then(|| {
                SpeechToTextSource::new(config.app.whisper_model.clone())
                    .translating_to_english(translate_to.as_deref().map(utils::is_english).unwrap_or(false))
            });
            let acquirer = TranscriptAcquirer::youtube(speech);

            if !acquirer.is_local_file(&input) {
                // Check for required external tools (non-fatal)
                let missing_deps = utils::check_dependencies(speech_fallback).await;
                if !missing_deps.is_empty() {
                    eprintln!("{}  Dependency check warnings:", style("⚠️").yellow());
                    for dep in missing_deps {
                        eprintln!("   • {}", dep);
                    }
                }
            }

            // Fail on a missing API key before spending time on downloads
            let agents = StageAgents::from_config(&config)?;

            tracing::info!("Acquiring transcript for: {}", input);
            let transcript = acquirer.acquire(&input, language.as_deref()).await?;
            tracing::info!(
                origin = %transcript.origin,
                chars = transcript.text.chars().count(),
                "Transcript acquired"
            );

            let pipeline = SummaryPipeline::new(settings, agents).with_progress(!cli.quiet);
            let result = pipeline.run(&transcript.text).await?;

            let format = format.unwrap_or(config.app.default_output_format);
            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, format).await?;
                    println!("Notes saved to: {}", path.display());
                }
                None => output::print_to_console(&result, format)?,
            }

            report_run(&result);
        }
        Commands::Ask { notes, question } => {
            let config = Config::load().await?;
            let artifact = output::load_notes(&notes)?;
            let agents = StageAgents::from_config(&config)?;

            let answer = qa::answer(&agents.answer, &artifact, &question).await?;
            println!("{}", answer);
        }
        Commands::Chunks {
            file,
            chunking,
            show_segments,
        } => {
            let config = Config::load().await?;
            let mut settings = config.pipeline.clone();
            chunking.apply(&mut settings);
            settings.check().context("Invalid chunking settings")?;

            let text = LocalFileSource::new()
                .read(&file)
                .await
                .with_context(|| format!("Failed to read transcript {}", file.display()))?;
            let segments = segment(&text, settings.max_chars, settings.min_tail_chars)?;
            let batches = group(&segments, settings.batch_size)?;

            let stats = ChunkStats::collect(&segments, &batches);
            print!("{}", output::format_chunk_report(&stats, &segments, show_segments));
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                config.interactive_setup()?;
            }
        }
        Commands::Sources => {
            println!("Supported transcript sources:");
            println!("  • YouTube subtitles and auto-captions (youtube.com, youtu.be, bare video ids) via yt-dlp");
            println!("  • Speech-to-text fallback with whisper when a video has no subtitles");
            println!("  • Local transcript files (txt, md)");
            println!("  • Local caption files (vtt, srt)");
        }
    }

    Ok(())
}

/// Verdict and degraded items go to stderr so stdout stays clean notes
fn report_run(result: &PipelineOutput) {
    match &result.verdict {
        ValidationVerdict::Approved => eprintln!("{} Notes approved by validator", style("✓").green()),
        ValidationVerdict::Suggestions(text) => {
            eprintln!("{} Validator suggestions:", style("!").yellow());
            for line in text.lines() {
                eprintln!("   {}", line);
            }
        }
        ValidationVerdict::Unavailable(reason) => {
            eprintln!("{} Validation unavailable: {}", style("!").yellow(), reason)
        }
        ValidationVerdict::Skipped => {}
    }

    if !result.failures.is_empty() {
        eprintln!(
            "{} {} item(s) used unprocessed text: {}",
            style("⚠️").yellow(),
            result.failures.len(),
            output::describe_failures(&result.failures)
        );
    }

    eprintln!(
        "{} {} segments, {} batches in {}",
        style("Done:").bold(),
        result.stats.segments,
        result.stats.batches,
        utils::format_duration(result.stats.elapsed_secs)
    );
}
