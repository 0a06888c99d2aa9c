use clap::{ArgAction, Parser as ClapParser};
use myjit::{OptLevel, Pipeline, SessionConfig};
use tracing::Level;

#[allow(clippy::upper_case_acronyms)]
#[derive(ClapParser)]
#[command(
    name = "myjit",
    version,
    about = "Build a hello function in IR, JIT compile it, and run it"
)]
pub struct CLI {
    #[command(flatten)]
    pub opts: Options,
}

#[derive(ClapParser, Debug, Clone)]
pub struct Options {
    #[arg(
        long = "module",
        value_name = "NAME",
        default_value = "myjit",
        help = "Name of the module the hello function is built in.",
        help_heading = "Program options",
        env = "MYJIT_MODULE"
    )]
    pub module: String,
    #[arg(
        long = "message",
        value_name = "TEXT",
        default_value = "hello",
        help = "Text the generated function writes, one putchar call per byte.",
        help_heading = "Program options",
        env = "MYJIT_MESSAGE"
    )]
    pub message: String,
    #[arg(
        long = "no-newline",
        action = ArgAction::SetTrue,
        help = "Do not append a newline to the message.",
        help_heading = "Program options"
    )]
    pub no_newline: bool,
    #[arg(
        long = "print-ir",
        action = ArgAction::SetTrue,
        help = "Print the generated IR to stderr before compiling.",
        help_heading = "Program options"
    )]
    pub print_ir: bool,
    #[arg(
        long = "opt-level",
        default_value_t = OptLevel::Speed,
        value_name = "LEVEL",
        help = "Code generation optimization level.",
        long_help = "Possible values: none, speed, speed_and_size",
        help_heading = "Compiler options",
        env = "MYJIT_OPT_LEVEL"
    )]
    pub opt_level: OptLevel,
    #[arg(
        long = "passes",
        default_value_t = Pipeline::default(),
        value_name = "PASSES",
        help = "Comma-separated optimization passes run before code generation.",
        long_help = "Possible passes: instcombine, reassociate, gvn, simplifycfg, mem2reg, adce. Use `none` to skip optimization.",
        help_heading = "Compiler options",
        env = "MYJIT_PASSES"
    )]
    pub passes: Pipeline,
    #[arg(
        long = "log.level",
        default_value_t = Level::WARN,
        value_name = "LOG_LEVEL",
        env = "MYJIT_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error. RUST_LOG directives take precedence.",
        help_heading = "Program options"
    )]
    pub log_level: Level,
}

impl Options {
    /// The bytes the generated function writes.
    pub fn output(&self) -> String {
        if self.no_newline {
            self.message.clone()
        } else {
            format!("{}\n", self.message)
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            opt_level: self.opt_level,
            pipeline: self.passes.clone(),
            ..SessionConfig::default()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            module: "myjit".to_string(),
            message: "hello".to_string(),
            no_newline: false,
            print_ir: false,
            opt_level: OptLevel::Speed,
            passes: Pipeline::default(),
            log_level: Level::WARN,
        }
    }
}
