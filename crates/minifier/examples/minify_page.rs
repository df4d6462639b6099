//! Minify a small page with every pass enabled and print the result

use minifier::{minify_with_report, PassConfig};

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Demo</title>
    <link rel="stylesheet" type="text/css" href="https://example.com/site.css" media="all">
    <script type="text/javascript">console.log("hi");</script>
  </head>
  <body>
    <!-- navigation -->
    <ul class="nav  main">
      <li><a href="https://example.com/">Home</a></li>
      <li><a href="https://example.com/about">About</a></li>
      <li><a href="https://github.com/">Elsewhere</a></li>
    </ul>
    <p>
      Hello,   <b>world</b>!
    </p>
  </body>
</html>
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut config = PassConfig::all();
    config.make_same_domains_links_relative = vec!["example.com".to_string()].into();
    println!("Settings:\n{}\n", config.to_json()?);

    let (output, report) = minify_with_report(PAGE, &config);

    println!("{}\n", output);
    println!(
        "{} -> {} bytes ({} saved), {} passes run",
        report.input_len,
        report.output_len,
        report.saved(),
        report.passes_run.len()
    );
    println!("Report: {}", serde_json::to_string(&report)?);

    Ok(())
}
