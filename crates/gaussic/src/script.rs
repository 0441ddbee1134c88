//! The command-script dispatcher.
//!
//! A script is a line-oriented list of commands, case-insensitive, with
//! `%` or `#` starting a comment line. Each command name maps to a
//! handler that consumes typed arguments from the rest of the line and
//! drives the engine facade; unknown names and malformed arguments are
//! config errors naming the offending command.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use gaussic_core::constraints::ConstraintKind;
use gaussic_core::engine::{IcGenerator, TargetKind};
use gaussic_core::Real;

use crate::error::{CliError, Result};
use crate::io::{read_id_file, write_grid_dump, write_id_file, write_spectrum_file};
use crate::snapshot::save_gadget;

/// Typed argument cursor over the remainder of a command line.
pub struct ArgStream<'a> {
    command: &'a str,
    tokens: std::str::SplitWhitespace<'a>,
}

impl<'a> ArgStream<'a> {
    fn new(command: &'a str, rest: std::str::SplitWhitespace<'a>) -> Self {
        Self {
            command,
            tokens: rest,
        }
    }

    /// The next raw token, or a config error naming the command.
    pub fn next_str(&mut self) -> Result<&'a str> {
        self.tokens
            .next()
            .ok_or_else(|| CliError::Config(format!("`{}`: missing argument", self.command)))
    }

    /// The next raw token, if any.
    pub fn next_optional(&mut self) -> Option<&'a str> {
        self.tokens.next()
    }

    /// The next token parsed to a value.
    pub fn value<V: FromStr>(&mut self) -> Result<V> {
        let token = self.next_str()?;
        token.parse().map_err(|_| {
            CliError::Config(format!(
                "`{}`: cannot parse argument '{token}'",
                self.command
            ))
        })
    }

    /// The next token as the scalar type of the run.
    pub fn scalar<T: Real>(&mut self) -> Result<T> {
        Ok(T::cast(self.value::<f64>()?))
    }
}

/// Run state carried across commands.
pub struct Session<T: Real> {
    /// The engine facade
    pub engine: IcGenerator<T>,
    script_dir: PathBuf,
    outdir: PathBuf,
    outname: Option<String>,
    gadget_format: u8,
    base_n: usize,
    base_boxsize: f64,
}

type Handler<T> = fn(&mut Session<T>, &mut ArgStream<'_>) -> Result<()>;

impl<T: Real> Session<T> {
    /// A fresh session for a script in the given directory.
    pub fn new(script_dir: PathBuf) -> Self {
        Self {
            engine: IcGenerator::new(),
            outdir: script_dir.clone(),
            script_dir,
            outname: None,
            gadget_format: 2,
            base_n: 0,
            base_boxsize: 0.0,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.script_dir.join(path)
        }
    }

    fn output_base(&self) -> PathBuf {
        match &self.outname {
            Some(name) => self.outdir.join(name),
            None => {
                let precision = if T::tolerance() < 1e-6 { "doub" } else { "sing" };
                self.outdir.join(format!(
                    "IC_{precision}_z{}_{}_L{}",
                    self.engine.cosmology().redshift.as_f64(),
                    self.base_n,
                    self.base_boxsize
                ))
            }
        }
    }

    fn output_file(&self, suffix: &str) -> PathBuf {
        let base = self.output_base();
        let mut name = base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push('.');
        name.push_str(suffix);
        base.with_file_name(name)
    }

    fn parse_constraint_kind(&self, args: &mut ArgStream<'_>) -> Result<ConstraintKind> {
        let name = args.next_str()?;
        let axis = if name.eq_ignore_ascii_case("l") {
            Some(args.next_str()?)
        } else {
            None
        };
        Ok(ConstraintKind::parse(name, axis)?)
    }

    fn handle_done(&mut self) -> Result<()> {
        let report = self.engine.done()?;

        for (level, bins) in report.spectra.iter().enumerate() {
            let path = self.output_file(&format!("{level}.ps"));
            write_spectrum_file(&path, bins)?;
        }

        let boxsize = self.engine.context().grid_for_level(0).boxsize();
        let snapshot = self.output_file(&format!("gadget{}.dat", self.gadget_format));
        save_gadget(
            &snapshot,
            &report.particles,
            self.engine.cosmology(),
            boxsize,
            self.gadget_format,
        )?;
        Ok(())
    }
}

/// The command table: every recognized script command and its handler.
fn handlers<T: Real>() -> Vec<(&'static str, Handler<T>)> {
    vec![
        // cosmological and grid parameters
        ("om", |s, a| {
            s.engine.set_omega_m0(a.scalar()?);
            Ok(())
        }),
        ("ol", |s, a| {
            s.engine.set_omega_lambda0(a.scalar()?);
            Ok(())
        }),
        ("ob", |s, a| {
            s.engine.set_omega_baryon0(a.scalar()?);
            Ok(())
        }),
        ("s8", |s, a| {
            s.engine.set_sigma8(a.scalar()?);
            Ok(())
        }),
        ("ns", |s, a| {
            s.engine.set_ns(a.scalar()?);
            Ok(())
        }),
        ("hubble", |s, a| {
            s.engine.set_hubble(a.scalar()?);
            Ok(())
        }),
        ("zin", |s, a| {
            s.engine.set_redshift(a.scalar()?);
            Ok(())
        }),
        ("boxlength", |s, a| {
            let boxsize: f64 = a.value()?;
            s.base_boxsize = boxsize;
            s.engine.set_boxlength(T::cast(boxsize));
            Ok(())
        }),
        ("n", |s, a| {
            let n: usize = a.value()?;
            s.base_n = n;
            s.engine.set_grid_n(n);
            Ok(())
        }),
        ("camb", |s, a| {
            let path = s.resolve(a.next_str()?);
            s.engine.load_transfer_table(path)?;
            Ok(())
        }),
        // seeding
        ("seed", |s, a| {
            s.engine.seed(a.value()?);
            Ok(())
        }),
        ("seedfourier", |s, a| {
            s.engine.seed_fourier(a.value()?);
            Ok(())
        }),
        ("seedfourier_reverse", |s, a| {
            s.engine.seed_fourier_reverse(a.value()?);
            Ok(())
        }),
        // grids
        ("base_grid", |s, a| {
            let boxsize: f64 = a.value()?;
            let n: usize = a.value()?;
            s.base_boxsize = boxsize;
            s.base_n = n;
            s.engine.init_base_grid(T::cast(boxsize), n)?;
            Ok(())
        }),
        ("zoom_grid", |s, a| {
            let factor: usize = a.value()?;
            let n: usize = a.value()?;
            s.engine.init_zoom_grid(factor, n)?;
            Ok(())
        }),
        // selections
        ("idfile", |s, a| {
            let ids = read_id_file(&s.resolve(a.next_str()?))?;
            s.engine.set_flagged_cells(ids)?;
            Ok(())
        }),
        ("append_idfile", |s, a| {
            let ids = read_id_file(&s.resolve(a.next_str()?))?;
            s.engine.append_flagged_cells(ids)?;
            Ok(())
        }),
        ("dump_id", |s, a| {
            let path = s.resolve(a.next_str()?);
            write_id_file(&path, s.engine.flagged_cells())?;
            Ok(())
        }),
        ("centre", |s, a| {
            let centre = [a.scalar()?, a.scalar()?, a.scalar()?];
            s.engine.set_centre(centre);
            Ok(())
        }),
        ("centre_cell", |s, a| {
            s.engine.centre_on_cell(a.value()?)?;
            Ok(())
        }),
        ("selectsphere", |s, a| {
            s.engine.select_sphere(a.scalar()?)?;
            Ok(())
        }),
        ("selectcube", |s, a| {
            s.engine.select_cube(a.scalar()?)?;
            Ok(())
        }),
        ("select_nearest", |s, _| {
            s.engine.select_nearest()?;
            Ok(())
        }),
        ("truncate", |s, a| {
            let fraction: f64 = a.value()?;
            if !(0.0..=1.0).contains(&fraction) {
                return Err(CliError::Config(
                    "`truncate`: fraction must lie in [0, 1]".into(),
                ));
            }
            s.engine.truncate_selection(T::cast(fraction));
            Ok(())
        }),
        ("strays_on", |s, _| {
            s.engine.set_strays_allowed(true);
            Ok(())
        }),
        // constraints
        ("calculate", |s, a| {
            let kind = s.parse_constraint_kind(a)?;
            let value = s.engine.calculate(kind)?;
            println!("{kind:?}: calculated value = {value}");
            Ok(())
        }),
        ("constrain", |s, a| {
            let kind = s.parse_constraint_kind(a)?;
            let target = match a.next_str()?.to_ascii_lowercase().as_str() {
                "relative" => TargetKind::Relative,
                "absolute" => TargetKind::Absolute,
                other => {
                    return Err(CliError::Config(format!(
                        "`constrain`: expected relative or absolute, got '{other}'"
                    )))
                }
            };
            s.engine.constrain(kind, target, a.scalar()?)?;
            Ok(())
        }),
        ("constrain_direction", |s, a| {
            let name = a.next_str()?;
            let (renormalize, direction_first) = if name.eq_ignore_ascii_case("and_renormalize") {
                (true, a.next_str()?)
            } else {
                (false, name)
            };
            if !direction_first.eq_ignore_ascii_case("l") {
                return Err(CliError::Config(format!(
                    "`constrain_direction`: unsupported vector functional '{direction_first}'"
                )));
            }
            let direction = [a.scalar()?, a.scalar()?, a.scalar()?];
            let factor = if renormalize {
                Some(a.next_optional().map_or(Ok(T::one()), |token| {
                    token.parse::<f64>().map(T::cast).map_err(|_| {
                        CliError::Config(format!(
                            "`constrain_direction`: cannot parse factor '{token}'"
                        ))
                    })
                })?)
            } else {
                None
            };
            s.engine.constrain_direction(direction, factor)?;
            Ok(())
        }),
        // realization surgery
        ("reverse", |s, _| {
            s.engine.reverse()?;
            Ok(())
        }),
        ("reverse_smallk", |s, a| {
            s.engine.reverse_small_k(a.scalar()?)?;
            Ok(())
        }),
        ("reseed_smallk", |s, a| {
            let k_cut = a.scalar()?;
            s.engine.reseed_small_k(k_cut, a.value()?)?;
            Ok(())
        }),
        ("zerolevel", |s, a| {
            s.engine.zero_level(a.value()?)?;
            Ok(())
        }),
        ("exact_power_spectrum", |s, _| {
            s.engine.set_exact_power_spectrum(true);
            Ok(())
        }),
        // output
        ("outdir", |s, a| {
            s.outdir = s.resolve(a.next_str()?);
            Ok(())
        }),
        ("outname", |s, a| {
            s.outname = Some(a.next_str()?.to_string());
            Ok(())
        }),
        ("gadgetformat", |s, a| {
            let format: u8 = a.value()?;
            if format != 2 && format != 3 {
                return Err(CliError::Config(
                    "`gadgetformat`: supported formats are 2 and 3".into(),
                ));
            }
            s.gadget_format = format;
            Ok(())
        }),
        ("dump_ps", |s, a| {
            let level: usize = a.next_optional().map_or(Ok(0), |t| {
                t.parse()
                    .map_err(|_| CliError::Config(format!("`dump_ps`: bad level '{t}'")))
            })?;
            let bins = s.engine.measured_spectrum(level)?;
            let path = s.output_file(&format!("{level}.ps"));
            write_spectrum_file(&path, &bins)?;
            Ok(())
        }),
        ("dump_grid", |s, a| {
            let level: usize = a.next_optional().map_or(Ok(0), |t| {
                t.parse()
                    .map_err(|_| CliError::Config(format!("`dump_grid`: bad level '{t}'")))
            })?;
            let values = s.engine.level_field_real(level)?;
            let path = s.output_file(&format!("grid-{level}.txt"));
            write_grid_dump(&path, &values)?;
            Ok(())
        }),
        ("done", |s, _| s.handle_done()),
    ]
}

/// Execute a whole script.
pub fn run_script<T: Real>(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let script_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut session = Session::<T>::new(script_dir);
    let table = handlers::<T>();

    for (line_number, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') || trimmed.starts_with('#') {
            continue;
        }
        let mut tokens = trimmed.split_whitespace();
        let command = tokens.next().expect("non-empty line has a first token");
        let name = command.to_ascii_lowercase();

        let handler = table
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, handler)| handler)
            .ok_or_else(|| {
                CliError::Config(format!("line {}: unknown command", line_number + 1))
                    .in_command(command)
            })?;

        let mut args = ArgStream::new(command, tokens);
        handler(&mut session, &mut args).map_err(|e| e.in_command(command))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("gaussic-script-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_flat_camb(dir: &Path) -> PathBuf {
        let path = dir.join("camb.dat");
        let mut text = String::new();
        for i in 1..=200 {
            let k = 0.001 * 1.06f64.powi(i);
            text.push_str(&format!("{k:.6e} 1.0 0 0 0 0 0\n"));
        }
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_unknown_command_is_config_error() {
        let dir = temp_dir();
        let script = dir.join("bad.params");
        std::fs::write(&script, "frobnicate 1 2 3\n").unwrap();
        let err = run_script::<f64>(&script).unwrap_err();
        assert!(err.to_string().contains("unknown command"));
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_missing_argument_is_config_error() {
        let dir = temp_dir();
        let script = dir.join("missing.params");
        std::fs::write(&script, "om\n").unwrap();
        let err = run_script::<f64>(&script).unwrap_err();
        assert!(err.to_string().contains("missing argument"));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let dir = temp_dir();
        let script = dir.join("comments.params");
        std::fs::write(&script, "% header comment\n\n# another\nom 0.3\n").unwrap();
        run_script::<f64>(&script).unwrap();
    }

    #[test]
    fn test_small_end_to_end_run() {
        let dir = temp_dir();
        write_flat_camb(&dir);
        let script = dir.join("run.params");
        std::fs::write(
            &script,
            "\
% minimal constrained run
Om 0.279
Ol 0.721
s8 0.8
zin 99
camb camb.dat
outname small-run
seedfourier 42
base_grid 50.0 16
centre 25 25 25
selectcube 12
constrain overdensity absolute 0.5
done
",
        )
        .unwrap();
        run_script::<f64>(&script).unwrap();
        assert!(dir.join("small-run.0.ps").exists());
        assert!(dir.join("small-run.gadget2.dat").exists());
    }
}
