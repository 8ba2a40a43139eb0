fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if handle_cli_flags(&args) {
        return;
    }

    if let Err(err) = reelview::run(args) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn handle_cli_flags(args: &[String]) -> bool {
    let mut saw_flag = false;
    for arg in args {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("reelview {}", reelview::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!(
                    "reelview - browse the short-drama catalog from the terminal.\n\n\
                     Usage: reelview [--offline] [--config <path>] <command>\n\n\
                     Commands:\n  \
                       channels                  List active channels (* marks the default)\n  \
                       videos [channel] [page]   Show one page of a channel's videos\n  \
                       category <type> [pages]   List a category, loading [pages] pages\n  \
                       sources                   List playback sources\n  \
                       home                      Show featured titles and category rows\n\n\
                     Options:\n  \
                       --offline                 Use the built-in sample catalog\n  \
                       --config <path>           Read configuration from <path>\n  \
                       --version, -V             Show version and exit\n  \
                       --help,    -h             Show this help message"
                );
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
