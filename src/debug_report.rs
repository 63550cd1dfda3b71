use caduceus::{ExtractResultVerbose, Extraction, RuleMetrics};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(input: &str, res: &ExtractResultVerbose, color: bool) {
    let palette = ansi::Palette::new(color);
    let preview: String = input.trim().chars().take(60).collect();
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Extracting: \"{}\"", preview), ansi::CYAN)));
    println!(
        "  {}",
        palette.dim(format!("{} tokens, {} sentences", res.details.tokens, res.details.sentences))
    );

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    for rule in &res.details.rules {
        print_rule(rule, &palette);
    }

    println!("\n{}", palette.paint("━━━ Annotations ━━━", ansi::GRAY));
    if res.results.is_empty() {
        println!("{}", palette.dim("  No annotations produced"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • Sequences were gated out (a required literal is missing)");
        println!("  • Triggers didn't match");
        println!("  • Captures were empty, so constructors were skipped");
        println!("\n{}", palette.dim("  Tip: run with --debug or CADUCEUS_LOG=caduceus=trace for details"));
    } else {
        for (idx, ext) in res.results.iter().enumerate() {
            print_extraction(idx, ext, &palette);
        }
    }

    if !res.details.relations.is_empty() {
        println!("\n{}", palette.paint("━━━ Relations ━━━", ansi::GRAY));
        for rel in &res.details.relations {
            let value = if rel.value.is_empty() { String::new() } else { format!(" = \"{}\"", rel.value) };
            println!(
                "  {} {} {} {}{}",
                palette.paint(&rel.source, ansi::GREEN),
                palette.paint(format!("─{}→", rel.kind), ansi::BLUE),
                palette.paint(&rel.target, ansi::GREEN),
                palette.dim("│"),
                palette.dim(value),
            );
        }
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!("  Total: {}", palette.paint(format!("{:?}", res.details.total), ansi::GREEN));
    println!();
}

fn print_rule(rule: &RuleMetrics, palette: &ansi::Palette) {
    let summary = if rule.matches > 0 {
        palette.paint(format!("✓ {} matches", rule.matches), ansi::GREEN)
    } else {
        palette.dim(format!("✗ {} matches", rule.matches))
    };
    println!(
        "  {} {}  {}",
        palette.paint(format!("[{}]", rule.rule), ansi::BLUE),
        summary,
        palette.dim(format!("{:?}", rule.duration))
    );
    println!(
        "      {}",
        palette.dim(format!(
            "scanned {} │ gated {} │ +{} annotations │ +{} relations │ skipped {}",
            rule.sequences_scanned, rule.sequences_skipped, rule.annotations, rule.relations, rule.skipped
        ))
    );
    if rule.fuel_exhausted > 0 {
        println!(
            "      {}",
            palette.paint(format!("fuel exhausted at {} positions", rule.fuel_exhausted), ansi::YELLOW)
        );
    }
}

fn print_extraction(idx: usize, ext: &Extraction, palette: &ansi::Palette) {
    let span = match ext.byte_range {
        Some((start, end)) => format!("bytes {start}..{end}"),
        None => format!("tokens {}..{}", ext.span.start, ext.span.end),
    };
    println!(
        "  {} {} {} {}",
        palette.paint(format!("[{}]", idx), ansi::GRAY),
        palette.bold(palette.paint(&ext.text, ansi::GREEN)),
        palette.dim("│"),
        palette.paint(span, ansi::YELLOW),
    );
    println!(
        "      {} {}  {} {}",
        palette.dim("type:"),
        palette.paint(&ext.kind, ansi::BLUE),
        palette.dim("│ rule:"),
        palette.paint(&ext.rule, ansi::CYAN)
    );
    for (name, value) in &ext.attributes {
        println!("      {} {}", palette.dim(format!("${name} =")), value);
    }
}
