//! webpp CLI - render a template against a render-values file.

use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webpp_render::{load_render_values, Basic, Context, RenderContext, Xhtml5};

#[derive(Parser)]
#[command(name = "webpp")]
#[command(about = "Render an XML template against a set of values", long_about = None)]
struct Cli {
    /// Render-values file: `path value` lines, `prefix[index].subpath
    /// value` for array elements
    values: PathBuf,

    /// XML template file
    template: PathBuf,

    /// Directory resolved for `webpp://control:insert` fragments
    #[arg(long, default_value = ".")]
    library: PathBuf,

    /// Emit XHTML5: doctype, no XML declaration, comments stripped
    #[arg(long)]
    xhtml5: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut ctx = Context::new(&cli.library);
    ctx.load_taglib::<Basic>();

    let template = std::fs::read_to_string(&cli.template)
        .with_context(|| format!("reading template {}", cli.template.display()))?;
    ctx.put("template", &template)
        .map_err(|err| anyhow!("{}", err.format()))?;

    let values = std::fs::read_to_string(&cli.values)
        .with_context(|| format!("reading values {}", cli.values.display()))?;
    let mut rnd = RenderContext::new();
    load_render_values(&values, rnd.root()).map_err(|err| anyhow!("{}", err.format()))?;

    let rendered = ctx
        .get("template")
        .and_then(|fragment| fragment.render(&mut rnd));

    match rendered {
        Ok(mut output) => {
            if cli.xhtml5 {
                output.xhtml5(
                    Xhtml5::DOCTYPE | Xhtml5::REMOVE_XML_DECLARATION | Xhtml5::REMOVE_COMMENTS,
                );
            } else {
                output.xml();
            }
            println!("{}", output);
            Ok(())
        }
        Err(err) => Err(anyhow!("{}", err.format())),
    }
}
