pub mod args;

use clap::Parser;
pub use args::{Arguments, ReferenceKind};

pub fn parse() -> Arguments {
    Arguments::parse()
}
