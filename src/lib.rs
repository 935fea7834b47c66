use clap::Parser;
use std::process::ExitCode;

pub mod access;
pub mod error;
pub mod native;
pub mod tracer;
pub mod view;

pub use access::{
    instance, Accessor, MemoryAccessor, NativeAccessor, ReflectAccessor, UnsafeAccessor,
};
pub use error::Error;
pub use view::{Address, ReleaseHook, View, ViewKind};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Capability report for the raw memory-access layer"
)]
pub struct Args {
    /// Probe every backend individually instead of only the selected one.
    #[arg(short, long)]
    pub all: bool,
}

pub fn run_cli() -> ExitCode {
    let args = Args::parse();

    let accessor = access::instance();
    println!("selected backend: {}", accessor.name());
    println!("page size:        {}", accessor.get_page_size());
    println!("cache line size:  {}", accessor.get_cache_line_size());
    println!("byte order:       {:?}", native::native_order());
    println!("bulk-op symbols:  {}", native::support_source());

    if args.all {
        println!();
        report("unsafe", UnsafeAccessor::new().map(|_| ()));
        report("reflect", ReflectAccessor::new().map(|_| ()));
        report("native", Ok(()));
    }

    ExitCode::SUCCESS
}

fn report(name: &str, outcome: Result<(), Error>) {
    match outcome {
        Ok(()) => println!("backend {name:<8} available"),
        Err(e) => println!("backend {name:<8} unavailable: {e}"),
    }
}
