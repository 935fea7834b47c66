use std::process::ExitCode;

fn main() -> ExitCode {
    memaccess::run_cli()
}
