//! Account population generation

use std::collections::BTreeMap;

use rand::Rng;
use tracing::info;

use crate::{
    config::City,
    errors::{Result, SynthError},
    utils, AccountClass, AccountProfile, DeviceType,
};

/// All account profiles of a run, keyed and iterated by id
#[derive(Debug, Clone, Default)]
pub struct Population {
    profiles: BTreeMap<String, AccountProfile>,
}

impl Population {
    pub fn from_profiles(profiles: impl IntoIterator<Item = AccountProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&AccountProfile> {
        self.profiles.get(id)
    }

    pub fn all(&self) -> Vec<&AccountProfile> {
        self.profiles.values().collect()
    }

    pub fn legitimate(&self) -> Vec<&AccountProfile> {
        self.profiles
            .values()
            .filter(|p| p.class == AccountClass::Legitimate)
            .collect()
    }

    pub fn fraud_designated(&self) -> Vec<&AccountProfile> {
        self.profiles
            .values()
            .filter(|p| p.class == AccountClass::FraudDesignated)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

pub struct ProfileGenerator;

impl ProfileGenerator {
    /// Create `legit_count` legitimate and `fraud_count` fraud-designated profiles
    pub fn generate<R: Rng + ?Sized>(
        legit_count: usize,
        fraud_count: usize,
        cities: &[City],
        rng: &mut R,
    ) -> Result<Population> {
        if legit_count == 0 {
            return Err(SynthError::invalid("legitimate account count must be greater than 0"));
        }
        if cities.is_empty() {
            return Err(SynthError::invalid("cannot assign typical locations without cities"));
        }

        let classes = std::iter::repeat(AccountClass::Legitimate)
            .take(legit_count)
            .chain(std::iter::repeat(AccountClass::FraudDesignated).take(fraud_count));

        let profiles = classes.enumerate().map(|(i, class)| AccountProfile {
            id: format!("ACC{:06}", i + 1),
            class,
            typical_location: utils::pick(rng, cities).name.clone(),
            typical_device: *utils::pick(rng, &DeviceType::ALL),
        });
        let population = Population::from_profiles(profiles.collect::<Vec<_>>());

        info!(
            legitimate = legit_count,
            fraud_designated = fraud_count,
            "Generated account population"
        );

        Ok(population)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::utils::master_rng;
    use std::collections::HashSet;

    #[test]
    fn test_population_counts_and_ids() {
        let config = GeneratorConfig::small();
        let mut rng = master_rng(Some(1));
        let population = ProfileGenerator::generate(40, 6, &config.cities, &mut rng).unwrap();

        assert_eq!(population.len(), 46);
        assert_eq!(population.legitimate().len(), 40);
        assert_eq!(population.fraud_designated().len(), 6);

        let ids: HashSet<&str> = population.all().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 46);
    }

    #[test]
    fn test_profiles_use_configured_cities() {
        let config = GeneratorConfig::small();
        let mut rng = master_rng(Some(2));
        let population = ProfileGenerator::generate(100, 0, &config.cities, &mut rng).unwrap();

        let city_names: HashSet<&str> = config.cities.iter().map(|c| c.name.as_str()).collect();
        for profile in population.all() {
            assert!(city_names.contains(profile.typical_location.as_str()));
            assert!(!profile.is_fraud_designated());
        }
    }

    #[test]
    fn test_zero_legitimate_accounts_rejected() {
        let config = GeneratorConfig::small();
        let mut rng = master_rng(Some(3));
        let result = ProfileGenerator::generate(0, 5, &config.cities, &mut rng);
        assert!(matches!(result, Err(SynthError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_lookup_by_id() {
        let config = GeneratorConfig::small();
        let mut rng = master_rng(Some(4));
        let population = ProfileGenerator::generate(3, 1, &config.cities, &mut rng).unwrap();

        let fraud = population.get("ACC000004").unwrap();
        assert!(fraud.is_fraud_designated());
        assert!(population.get("ACC999999").is_none());
    }
}
