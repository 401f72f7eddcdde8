//! CSV fixtures shared by the integration tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use agri_monitor::services::DataSources;
use tempfile::TempDir;

pub const MONITORING_CSV: &str = "\
parcelle_id,date,ndvi,lower_threshold,upper_threshold,stress_hydrique,predicted_yield,latitude,longitude,zone
P001,2024-05-03,0.62,0.4,0.8,20,6.8,45.10,4.80,Nord
P002,2024-05-01,0.35,0.4,0.8,15,5.1,45.20,4.90,Sud
P001,2024-05-10,0.70,0.4,0.8,NaN,7.0,45.10,4.80,Nord
P003,2024-04-28,0.55,0.4,0.8,25,,45.30,5.00,Est
";

pub const WEATHER_CSV: &str = "\
date,température,meteo_condition,humidite
2024-04-30,28,Ensoleillé,40
2024-05-03,30,Nuageux,55
2024-05-08,26,Pluie,80
";

pub const SOIL_CSV: &str = "\
parcelle_id,type_sol,ph,risque,latitude,longitude
P001,argileux,6.5,0.3,45.10,4.80
P002,sableux,7.1,0.7,45.20,4.90
";

pub const YIELD_CSV: &str = "\
parcelle_id,annee,rendement,culture
P001,2020,5,Blé
P001,2021,6,Maïs
P001,2022,7,Blé
P002,2021,4.5,Colza
";

/// Temp directory holding the four source files
pub struct Fixture {
    pub dir: TempDir,
    pub sources: DataSources,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_files(MONITORING_CSV, WEATHER_CSV, SOIL_CSV, YIELD_CSV)
    }

    pub fn with_files(monitoring: &str, weather: &str, soil: &str, yields: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let sources = DataSources {
            monitoring: write(dir.path(), "monitoring_cultures.csv", monitoring),
            weather: write(dir.path(), "meteo_detaillee.csv", weather),
            soil: write(dir.path(), "sols.csv", soil),
            yield_history: write(dir.path(), "historique_rendements.csv", yields),
        };
        Self { dir, sources }
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}
