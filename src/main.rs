use std::process;
use std::sync::Arc;

use clap::Parser;
use log::error;
use mp3_library_converter::{
    cli::commands::{Cli, Mode},
    pipeline::PipelineFactory,
    utils::reporting::Reporter,
    BatchConverter, DuplicateFinder, TagExtractor,
};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mode = match cli.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let factory: Arc<dyn PipelineFactory> = Arc::new(cli.engine_config());
    let options = cli.convert_options();
    let reporter = Reporter::new();

    match mode {
        Mode::ConvertFile(path) => {
            let mut converter = BatchConverter::new(factory, options);
            if let Err(e) = converter.process_file(&path) {
                error!("{}", e);
            }
        }

        Mode::ConvertDirectory(root) => {
            println!("=== Converting {} ===", root.display());
            println!("Destination: {}", options.dest_root.display());
            println!("Quality: {}", options.quality);
            println!("Dry run mode: {}", options.dry_run);

            let mut converter = BatchConverter::new(factory, options);
            match converter.process_directory(&root) {
                Ok(summary) => reporter.print_batch_summary(&summary),
                Err(e) => error!("Error processing directory: {}", e),
            }
        }

        Mode::FindDuplicates {
            root,
            quarantine,
            report,
        } => {
            println!("=== Scanning {} for duplicates ===", root.display());

            let mut finder = DuplicateFinder::new(TagExtractor::from_factory(factory.as_ref()));
            let duplicates = match finder.find_duplicates(
                &root,
                &options.dest_root,
                quarantine.as_deref(),
                options.verbose,
            ) {
                Ok(duplicates) => duplicates,
                Err(e) => {
                    error!("Error scanning for duplicates: {}", e);
                    return;
                }
            };

            if let Err(e) = reporter.print_duplicate_report(&duplicates) {
                error!("Error printing report: {}", e);
            }
            if let Some(report_path) = report {
                if let Err(e) = reporter.generate_duplicate_csv(&duplicates, &report_path) {
                    error!("Error generating report: {}", e);
                }
            }
        }
    }
}
