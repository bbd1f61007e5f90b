use std::io::Write;

use ipeople_core::PmResult;

use super::{Outcome, Session};

/// Print where the configuration lives and how to apply edits.
pub fn show(session: &mut Session<'_>) -> PmResult<Outcome> {
    let env_file = session.settings.env_file();
    writeln!(session.out, "Configuration file: {}", env_file.display())?;
    writeln!(session.out, "Compose file:       {}", session.settings.compose_file().display())?;
    writeln!(session.out)?;
    writeln!(session.out, "To change settings (port, URL, SMTP, SAML), edit the file:")?;
    writeln!(session.out, "  sudo nano {}", env_file.display())?;
    writeln!(session.out, "then apply the changes with:")?;
    writeln!(session.out, "  ipeople-pm restart")?;
    writeln!(session.out)?;
    writeln!(
        session.out,
        "Do not change SECRET_KEY or POSTGRES_PASSWORD on an existing installation."
    )?;
    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use crate::Commands;
    use crate::commands::testing::Harness;

    #[test]
    fn test_config_prints_path_without_backend_calls() {
        let mut h = Harness::new();
        h.run(&Commands::Config, "").unwrap();
        let out = h.output();
        assert!(out.contains(&h.settings.env_file().display().to_string()));
        assert!(out.contains("ipeople-pm restart"));
        assert!(h.backend.calls().is_empty());
    }
}
