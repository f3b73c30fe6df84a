//! The `fingerprint` command: generate and display a fingerprint.

use clap::Args;

use crate::fingerprint::{Fingerprint, FingerprintCatalog};

#[derive(Args)]
pub struct FingerprintArgs {
    /// Seed for a reproducible fingerprint
    #[arg(long)]
    seed: Option<u64>,

    /// Also print the full injection script
    #[arg(long)]
    script: bool,
}

pub fn run(args: FingerprintArgs) -> anyhow::Result<()> {
    let fp = Fingerprint::generate(&FingerprintCatalog::builtin(), args.seed);

    println!("seed:                 {}", fp.seed);
    println!("screen:               {}x{}", fp.screen_width, fp.screen_height);
    println!("window:               {}x{}", fp.window_width, fp.window_height);
    println!("user agent:           {}", fp.user_agent);
    println!("language:             {}", fp.primary_language());
    println!("timezone:             {} (offset {})", fp.timezone_name, fp.timezone_offset);
    println!("webgl vendor:         {}", fp.webgl.vendor);
    println!("webgl renderer:       {}", fp.webgl.renderer);
    println!("hardware concurrency: {}", fp.hardware_concurrency);
    println!("device memory:        {}GB", fp.device_memory);
    println!("platform:             {}", fp.platform);
    println!("canvas hash:          {}", fp.canvas_hash);
    println!("webgl hash:           {}", fp.webgl_hash);
    println!("audio hash:           {}", fp.audio_hash);

    if args.script {
        println!();
        println!("{}", fp.injection_script());
    }

    Ok(())
}
