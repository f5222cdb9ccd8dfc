use pokemon_pvp_rankings::{
    parse_combatant, run_rank, run_simulate, MovesetMode, RankCli, SimulateCli,
};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!(
        "Usage:\n  pokemon-pvp-rankings rank --gamemaster FILE --format ID [--mode forced|auto] \
[--output DIR] [--matrix FILE.csv] [--reference FILE.json] [--seed N]\n  \
pokemon-pvp-rankings simulate --gamemaster FILE --a SPEC --b SPEC [--cp N] [--shields A,B] \
[--energy A,B] [--log] [--log-json]\n\nSPEC is species[:shadow]:FAST:CHARGED[,CHARGED]"
    );
    std::process::exit(1);
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str, what: &str) -> anyhow::Result<String> {
    args.next()
        .ok_or_else(|| anyhow::anyhow!("{flag} requires {what}"))
}

fn parse_pair(raw: &str, flag: &str) -> anyhow::Result<[u8; 2]> {
    let (a, b) = raw
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("{flag} expects two values like 1,1"))?;
    Ok([a.trim().parse()?, b.trim().parse()?])
}

fn parse_rank(mut args: impl Iterator<Item = String>) -> anyhow::Result<RankCli> {
    let mut gamemaster = PathBuf::from("data/gamemaster.sample.json");
    let mut format_id = None;
    let mut mode = None;
    let mut output_dir = PathBuf::from("rankings");
    let mut matrix_path = None;
    let mut reference = None;
    let mut seed = 0u64;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gamemaster" => {
                gamemaster = PathBuf::from(next_value(&mut args, "--gamemaster", "a path")?);
            }
            "--format" => format_id = Some(next_value(&mut args, "--format", "a format id")?),
            "--mode" => {
                let val = next_value(&mut args, "--mode", "forced or auto")?;
                mode = Some(match val.to_ascii_lowercase().as_str() {
                    "forced" => MovesetMode::Forced,
                    "auto" => MovesetMode::Auto,
                    other => anyhow::bail!("Unknown mode {other} (use forced or auto)"),
                });
            }
            "--output" => output_dir = PathBuf::from(next_value(&mut args, "--output", "a directory")?),
            "--matrix" => {
                matrix_path = Some(PathBuf::from(next_value(&mut args, "--matrix", "a path")?));
            }
            "--reference" => {
                reference = Some(PathBuf::from(next_value(&mut args, "--reference", "a path")?));
            }
            "--seed" => seed = next_value(&mut args, "--seed", "a number")?.parse()?,
            "--help" | "-h" => usage(),
            other => anyhow::bail!("Unknown argument {other}"),
        }
    }

    Ok(RankCli {
        gamemaster,
        format_id: format_id.ok_or_else(|| anyhow::anyhow!("--format is required"))?,
        mode,
        output_dir,
        matrix_path,
        reference,
        seed,
    })
}

fn parse_simulate(mut args: impl Iterator<Item = String>) -> anyhow::Result<SimulateCli> {
    let mut gamemaster = PathBuf::from("data/gamemaster.sample.json");
    let mut a = None;
    let mut b = None;
    let mut cp_cap = Some(1500);
    let mut shields = [1, 1];
    let mut energy = [0, 0];
    let mut log = false;
    let mut log_json = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gamemaster" => {
                gamemaster = PathBuf::from(next_value(&mut args, "--gamemaster", "a path")?);
            }
            "--a" => a = Some(parse_combatant(&next_value(&mut args, "--a", "a combatant")?)?),
            "--b" => b = Some(parse_combatant(&next_value(&mut args, "--b", "a combatant")?)?),
            "--cp" => {
                let val = next_value(&mut args, "--cp", "a CP cap or 'none'")?;
                cp_cap = match val.as_str() {
                    "none" | "0" => None,
                    n => Some(n.parse()?),
                };
            }
            "--shields" => shields = parse_pair(&next_value(&mut args, "--shields", "A,B")?, "--shields")?,
            "--energy" => energy = parse_pair(&next_value(&mut args, "--energy", "A,B")?, "--energy")?,
            "--log" => log = true,
            "--log-json" => log_json = true,
            "--help" | "-h" => usage(),
            other => anyhow::bail!("Unknown argument {other}"),
        }
    }

    Ok(SimulateCli {
        gamemaster,
        a: a.ok_or_else(|| anyhow::anyhow!("--a is required"))?,
        b: b.ok_or_else(|| anyhow::anyhow!("--b is required"))?,
        cp_cap,
        shields,
        energy,
        log,
        log_json,
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("rank") => run_rank(parse_rank(args)?),
        Some("simulate") => run_simulate(parse_simulate(args)?),
        Some("--help") | Some("-h") | None => usage(),
        Some(other) => anyhow::bail!("Unknown command {other} (use rank or simulate)"),
    }
}
