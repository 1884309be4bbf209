// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! build.rs for sbwprobe firmware

use jiff::Timestamp;

fn main() {
    println!("cargo:rerun-if-env-changed=ESP_LOG");
    println!("cargo:rerun-if-changed=build.rs");

    // Get build time and date
    //
    // Use the same source and formatting as esp-bootloader-esp-idf as we pass
    // these values into the esp_app_desc! macro.
    let build_time = Timestamp::now();
    let build_time_formatted = build_time.strftime("%H:%M:%S");
    let build_date_formatted = build_time.strftime("%Y-%m-%d");
    println!("cargo::rustc-env=SBWPROBE_BUILD_TIME={build_time_formatted}");
    println!("cargo::rustc-env=SBWPROBE_BUILD_DATE={build_date_formatted}");

    linker_be_nice();
    // linkall.x must be the last linker script
    println!("cargo:rustc-link-arg=-Tlinkall.x");

    built::write_built_file().expect("Failed to acquire build-time information");
}

// Turns common link failures into hints, when invoked by the linker as its
// error handling script
fn linker_be_nice() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 {
        let kind = &args[1];
        let what = &args[2];

        match kind.as_str() {
            "undefined-symbol" => match what.as_str() {
                "_stack_start" => {
                    eprintln!();
                    eprintln!("💡 Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                _ => (),
            },
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    println!(
        "cargo:rustc-link-arg=--error-handling-script={}",
        std::env::current_exe()
            .expect("Failed to get build script path")
            .display()
    );
}
