use i386link::error::emit_warning;
use i386link::options;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut options = match options::parse(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print!("{}", options::USAGE);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    let output_path = options.output_path.clone();

    let image = match i386link::prepare(&mut options) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    match i386link::write(&image, &output_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            if std::path::Path::new(&output_path).exists() {
                if let Err(remove_err) = std::fs::remove_file(&output_path) {
                    emit_warning(&format!(
                        "could not remove partial output '{output_path}': {remove_err}"
                    ));
                }
            }
            // A failure past this point is always a write failure (§6.3
            // exit code 4), regardless of what the generic `Io -> 2`
            // mapping in `LinkError::exit_code` would say.
            ExitCode::from(4)
        }
    }
}
