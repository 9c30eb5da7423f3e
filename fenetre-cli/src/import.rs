use anyhow::{bail, Context, Result};
use fenetre_db::rusqlite::Connection;
use std::path::Path;

use fenetre_db::db::insert_draw;
use fenetre_db::models::{validate_draw, Draw};

fn parse_record(record: &csv::StringRecord) -> Result<Draw> {
    let get = |idx: usize| -> Result<String> {
        record
            .get(idx)
            .map(|s| s.trim().to_string())
            .with_context(|| format!("Champ manquant à l'index {}", idx))
    };

    let get_u8 = |idx: usize| -> Result<u8> {
        let s = get(idx)?;
        s.parse::<u8>()
            .with_context(|| format!("Impossible de parser '{}' (index {})", s, idx))
    };

    let draw_id = get(0)?;
    let day = get(1)?;

    let raw_date = get(2)?;
    let date = parse_date(&raw_date)?;

    let balls: [u8; 5] = [
        get_u8(5)?,
        get_u8(6)?,
        get_u8(7)?,
        get_u8(8)?,
        get_u8(9)?,
    ];
    let stars: [u8; 2] = [get_u8(10)?, get_u8(11)?];

    validate_draw(&balls, &stars)?;

    Ok(Draw {
        draw_id,
        day,
        date,
        balls,
        stars,
    })
}

fn parse_date(raw: &str) -> Result<String> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        bail!("Format de date invalide: '{}'", raw);
    }
    Ok(format!("{}-{}-{}", parts[2], parts[1], parts[0]))
}

pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

pub fn import_csv(conn: &Connection, path: &Path) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Impossible d'ouvrir {:?}", path))?;

    let tx = conn.unchecked_transaction()
        .context("Impossible de démarrer la transaction")?;

    let mut result = ImportResult {
        total_records: 0,
        inserted: 0,
        skipped: 0,
        errors: 0,
    };

    for record_result in reader.records() {
        result.total_records += 1;
        match record_result {
            Ok(record) => {
                match parse_record(&record) {
                    Ok(draw) => {
                        match insert_draw(&tx, &draw) {
                            Ok(true) => result.inserted += 1,
                            Ok(false) => result.skipped += 1,
                            Err(e) => {
                                eprintln!("Erreur insertion tirage {}: {}", result.total_records, e);
                                result.errors += 1;
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("Erreur parsing ligne {}: {}", result.total_records, e);
                        result.errors += 1;
                    }
                }
            }
            Err(e) => {
                eprintln!("Erreur lecture ligne {}: {}", result.total_records, e);
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Échec du commit")?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("17/03/2024").unwrap(), "2024-03-17");
        assert!(parse_date("2024-03-17").is_err());
    }

    #[test]
    fn test_parse_record_ok() {
        let record = csv::StringRecord::from(vec![
            "2024031", "MARDI", "19/03/2024", "", "", "5", "12", "23", "34", "45", "3", "8",
        ]);
        let draw = parse_record(&record).unwrap();
        assert_eq!(draw.draw_id, "2024031");
        assert_eq!(draw.date, "2024-03-19");
        assert_eq!(draw.balls, [5, 12, 23, 34, 45]);
        assert_eq!(draw.stars, [3, 8]);
    }

    #[test]
    fn test_parse_record_rejects_out_of_range() {
        let record = csv::StringRecord::from(vec![
            "2024031", "MARDI", "19/03/2024", "", "", "5", "12", "23", "34", "51", "3", "8",
        ]);
        assert!(parse_record(&record).is_err());
    }

    #[test]
    fn test_import_csv_roundtrip() {
        use fenetre_db::db::{count_draws, migrate};

        let dir = std::env::temp_dir().join("fenetre_import_test");
        std::fs::create_dir_all(&dir).unwrap();
        let csv_path = dir.join("tirages.csv");
        std::fs::write(
            &csv_path,
            "annee_numero_de_tirage;jour_de_tirage;date_de_tirage;x;y;boule_1;boule_2;boule_3;boule_4;boule_5;etoile_1;etoile_2\n\
             2024032;VENDREDI;22/03/2024;;;1;2;3;4;5;1;2\n\
             2024031;MARDI;19/03/2024;;;6;7;8;9;10;3;4\n",
        )
        .unwrap();

        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let result = import_csv(&conn, &csv_path).unwrap();
        assert_eq!(result.inserted, 2);
        assert_eq!(result.errors, 0);
        assert_eq!(count_draws(&conn).unwrap(), 2);

        let _ = std::fs::remove_file(&csv_path);
    }
}
