use clap::Command;
use clap_complete::Shell;

pub fn run_completions(shell: Shell, cmd: &mut Command) {
    clap_complete::generate(shell, cmd, "vdl", &mut std::io::stdout());
}
