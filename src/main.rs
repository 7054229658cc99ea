use std::env;

use eyre::Result;
use neuro_tile::main_inner;

fn main() -> Result<()> {
    main_inner(env::args())
}
