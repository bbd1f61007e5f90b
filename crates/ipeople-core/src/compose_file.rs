//! The fixed `docker-compose.yml` describing the deployment.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::PmResult;

pub const DB_IMAGE: &str = "postgres:16-alpine";
pub const APP_IMAGE: &str = "ghcr.io/ipeople/ipeople:latest";

/// Render the compose file.
///
/// `app` only starts once `db` passes its health check. Values in `${...}`
/// are filled by Compose from the `.env` file next to it.
pub fn render() -> String {
    format!(
        r#"name: {project}

services:
  db:
    image: {db_image}
    restart: unless-stopped
    environment:
      POSTGRES_USER: ${{POSTGRES_USER}}
      POSTGRES_DB: ${{POSTGRES_DB}}
      POSTGRES_PASSWORD: ${{POSTGRES_PASSWORD}}
    volumes:
      - {volume}:/var/lib/postgresql/data
    networks:
      - {network}
    healthcheck:
      test: ["CMD-SHELL", "pg_isready -U $${{POSTGRES_USER}} -d $${{POSTGRES_DB}}"]
      interval: 5s
      timeout: 5s
      retries: 10

  app:
    image: {app_image}
    restart: unless-stopped
    env_file: .env
    environment:
      DATABASE_URL: postgres://${{POSTGRES_USER}}:${{POSTGRES_PASSWORD}}@db:5432/${{POSTGRES_DB}}
    ports:
      - "${{APP_PORT}}:8080"
    depends_on:
      db:
        condition: service_healthy
    networks:
      - {network}

volumes:
  {volume}:

networks:
  {network}:
"#,
        project = crate::PROJECT_NAME,
        db_image = DB_IMAGE,
        app_image = APP_IMAGE,
        volume = crate::DB_VOLUME,
        network = crate::NETWORK,
    )
}

/// Write the compose file unless one is already present. Returns whether
/// a file was written.
pub fn write_if_absent(path: &Path) -> PmResult<bool> {
    if path.exists() {
        return Ok(false);
    }
    fs::write(path, render())?;
    info!(path = %path.display(), "wrote compose file");
    Ok(true)
}
