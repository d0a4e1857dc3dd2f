use chrono::{Datelike, NaiveDate};
use fake::Fake;
use fake::faker::address::en::{
    BuildingNumber, CityName, Latitude, Longitude, StateAbbr, StateName, StreetName, ZipCode,
};
use fake::faker::company::en::CompanyName;
use fake::faker::currency::en::CurrencyName;
use fake::faker::internet::en::{IPv4, IPv6, SafeEmail, UserAgent, Username};
use fake::faker::lorem::en::Paragraph;
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use rand::Rng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::caches::ConsistencyCaches;
use crate::error::{Error, Result};
use crate::map::ColumnMap;
use crate::scramble::{random_digits, scramble_string, scrub_string};

/// Bundled corpora for categories the faker does not model.
const GENDERS: &[&str] = &["Male", "Female"];
const LANGUAGES: &[&str] = &[
    "Arabic",
    "Bengali",
    "Dutch",
    "English",
    "French",
    "German",
    "Hindi",
    "Italian",
    "Japanese",
    "Korean",
    "Mandarin",
    "Polish",
    "Portuguese",
    "Russian",
    "Spanish",
    "Swedish",
    "Turkish",
    "Vietnamese",
];

/// Per-worker state handed to processors: the worker's seeded generator and
/// the run-wide consistency caches.
pub struct ProcessContext<'a> {
    pub rng: &'a mut ChaCha8Rng,
    pub caches: &'a ConsistencyCaches,
}

/// The value-processor catalog. Every name accepted in a map document is a
/// variant here; renaming one is a breaking change to the map format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    Identity,
    ScrubString,
    EmptyJson,
    AlphaNumericScrambler,
    UniqueAlphaNumericScrambler,
    RandomUuid,
    RandomDate,
    RandomBoolean,
    RandomDigits,
    FakeStreetAddress,
    FakeCity,
    FakeState,
    FakeStateAbbrev,
    FakeZip,
    FakeLatitude,
    FakeLongitude,
    FakeFirstName,
    FakeLastName,
    FakeFullName,
    FakeUsername,
    FakeEmailAddress,
    FakePhoneNumber,
    FakeIpv4,
    FakeIpv6,
    FakeCompanyName,
    FakeGender,
    FakeCurrency,
    FakeLanguage,
    FakeParagraph,
    FakeUserAgent,
}

impl Processor {
    /// Resolve a catalog name from a map document. Unknown names are
    /// rejected at load time by [`crate::map::DbMap::validate`].
    pub fn from_name(name: &str) -> Option<Self> {
        let processor = match name {
            "Identity" => Processor::Identity,
            "ScrubString" => Processor::ScrubString,
            "EmptyJson" => Processor::EmptyJson,
            "AlphaNumericScrambler" => Processor::AlphaNumericScrambler,
            "UniqueAlphaNumericScrambler" => Processor::UniqueAlphaNumericScrambler,
            "RandomUUID" => Processor::RandomUuid,
            "RandomDate" => Processor::RandomDate,
            "RandomBoolean" => Processor::RandomBoolean,
            "RandomDigits" => Processor::RandomDigits,
            "FakeStreetAddress" => Processor::FakeStreetAddress,
            "FakeCity" => Processor::FakeCity,
            "FakeState" => Processor::FakeState,
            "FakeStateAbbrev" => Processor::FakeStateAbbrev,
            "FakeZip" => Processor::FakeZip,
            "FakeLatitude" => Processor::FakeLatitude,
            "FakeLongitude" => Processor::FakeLongitude,
            "FakeFirstName" => Processor::FakeFirstName,
            "FakeLastName" => Processor::FakeLastName,
            "FakeFullName" => Processor::FakeFullName,
            "FakeUsername" => Processor::FakeUsername,
            "FakeEmailAddress" => Processor::FakeEmailAddress,
            "FakePhoneNumber" => Processor::FakePhoneNumber,
            "FakeIPv4" => Processor::FakeIpv4,
            "FakeIPv6" => Processor::FakeIpv6,
            "FakeCompanyName" => Processor::FakeCompanyName,
            "FakeGender" => Processor::FakeGender,
            "FakeCurrency" => Processor::FakeCurrency,
            "FakeLanguage" => Processor::FakeLanguage,
            "FakeParagraph" => Processor::FakeParagraph,
            "FakeUserAgent" => Processor::FakeUserAgent,
            _ => return None,
        };
        Some(processor)
    }

    /// The catalog name, as spelled in map documents.
    pub fn name(&self) -> &'static str {
        match self {
            Processor::Identity => "Identity",
            Processor::ScrubString => "ScrubString",
            Processor::EmptyJson => "EmptyJson",
            Processor::AlphaNumericScrambler => "AlphaNumericScrambler",
            Processor::UniqueAlphaNumericScrambler => "UniqueAlphaNumericScrambler",
            Processor::RandomUuid => "RandomUUID",
            Processor::RandomDate => "RandomDate",
            Processor::RandomBoolean => "RandomBoolean",
            Processor::RandomDigits => "RandomDigits",
            Processor::FakeStreetAddress => "FakeStreetAddress",
            Processor::FakeCity => "FakeCity",
            Processor::FakeState => "FakeState",
            Processor::FakeStateAbbrev => "FakeStateAbbrev",
            Processor::FakeZip => "FakeZip",
            Processor::FakeLatitude => "FakeLatitude",
            Processor::FakeLongitude => "FakeLongitude",
            Processor::FakeFirstName => "FakeFirstName",
            Processor::FakeLastName => "FakeLastName",
            Processor::FakeFullName => "FakeFullName",
            Processor::FakeUsername => "FakeUsername",
            Processor::FakeEmailAddress => "FakeEmailAddress",
            Processor::FakePhoneNumber => "FakePhoneNumber",
            Processor::FakeIpv4 => "FakeIPv4",
            Processor::FakeIpv6 => "FakeIPv6",
            Processor::FakeCompanyName => "FakeCompanyName",
            Processor::FakeGender => "FakeGender",
            Processor::FakeCurrency => "FakeCurrency",
            Processor::FakeLanguage => "FakeLanguage",
            Processor::FakeParagraph => "FakeParagraph",
            Processor::FakeUserAgent => "FakeUserAgent",
        }
    }

    /// Rewrite one field value. Category-preserving: an address processor
    /// returns a plausible address, a name processor a plausible name.
    pub fn apply(
        &self,
        cmap: &ColumnMap,
        input: &str,
        ctx: &mut ProcessContext<'_>,
    ) -> Result<String> {
        match self {
            Processor::Identity => Ok(input.to_string()),
            Processor::ScrubString => Ok(scrub_string(input)),
            Processor::EmptyJson => Ok("{}".to_string()),
            Processor::AlphaNumericScrambler => scramble_mapped(cmap, input, ctx),
            Processor::UniqueAlphaNumericScrambler => scramble_unique(cmap, input, ctx),
            Processor::RandomUuid => map_uuid(input, ctx),
            Processor::RandomDate => random_date(input, ctx.rng),
            Processor::RandomBoolean => {
                let value = if ctx.rng.gen_bool(0.5) { "TRUE" } else { "FALSE" };
                Ok(value.to_string())
            }
            Processor::RandomDigits => Ok(random_digits(input.len(), ctx.rng)),
            Processor::FakeStreetAddress => {
                let number: String = BuildingNumber().fake_with_rng(ctx.rng);
                let street: String = StreetName().fake_with_rng(ctx.rng);
                Ok(format!("{number} {street}"))
            }
            Processor::FakeCity => Ok(CityName().fake_with_rng(ctx.rng)),
            Processor::FakeState => Ok(StateName().fake_with_rng(ctx.rng)),
            Processor::FakeStateAbbrev => Ok(StateAbbr().fake_with_rng(ctx.rng)),
            Processor::FakeZip => Ok(ZipCode().fake_with_rng(ctx.rng)),
            Processor::FakeLatitude => {
                let value: f64 = Latitude().fake_with_rng(ctx.rng);
                Ok(format!("{value:.6}"))
            }
            Processor::FakeLongitude => {
                let value: f64 = Longitude().fake_with_rng(ctx.rng);
                Ok(format!("{value:.6}"))
            }
            Processor::FakeFirstName => Ok(FirstName().fake_with_rng(ctx.rng)),
            Processor::FakeLastName => Ok(LastName().fake_with_rng(ctx.rng)),
            Processor::FakeFullName => Ok(Name().fake_with_rng(ctx.rng)),
            Processor::FakeUsername => Ok(Username().fake_with_rng(ctx.rng)),
            Processor::FakeEmailAddress => Ok(SafeEmail().fake_with_rng(ctx.rng)),
            Processor::FakePhoneNumber => Ok(PhoneNumber().fake_with_rng(ctx.rng)),
            Processor::FakeIpv4 => Ok(IPv4().fake_with_rng(ctx.rng)),
            Processor::FakeIpv6 => Ok(IPv6().fake_with_rng(ctx.rng)),
            Processor::FakeCompanyName => Ok(CompanyName().fake_with_rng(ctx.rng)),
            Processor::FakeGender => Ok(pick(GENDERS, ctx.rng)),
            Processor::FakeCurrency => Ok(CurrencyName().fake_with_rng(ctx.rng)),
            Processor::FakeLanguage => Ok(pick(LANGUAGES, ctx.rng)),
            Processor::FakeParagraph => Ok(Paragraph(3..6).fake_with_rng(ctx.rng)),
            Processor::FakeUserAgent => Ok(UserAgent().fake_with_rng(ctx.rng)),
        }
    }
}

fn pick(corpus: &[&str], rng: &mut ChaCha8Rng) -> String {
    corpus.choose(rng).copied().unwrap_or_default().to_string()
}

fn scramble_mapped(cmap: &ColumnMap, input: &str, ctx: &mut ProcessContext<'_>) -> Result<String> {
    let rng = &mut *ctx.rng;
    if cmap.has_parent() {
        ctx.caches
            .alpha_get(&cmap.parent_key(), input, || {
                Ok(scramble_string(input, &mut *rng))
            })
    } else {
        Ok(scramble_string(input, rng))
    }
}

fn scramble_unique(cmap: &ColumnMap, input: &str, ctx: &mut ProcessContext<'_>) -> Result<String> {
    let rng = &mut *ctx.rng;
    let caches = ctx.caches;
    let table_key = cmap.column_key();
    if cmap.has_parent() {
        caches.alpha_get(&cmap.parent_key(), input, || {
            caches.unique_get(&table_key, || Ok(scramble_string(input, &mut *rng)))
        })
    } else {
        caches.unique_get(&table_key, || Ok(scramble_string(input, &mut *rng)))
    }
}

fn map_uuid(input: &str, ctx: &mut ProcessContext<'_>) -> Result<String> {
    let parsed = Uuid::parse_str(input)
        .map_err(|err| Error::Processor(format!("unable to parse UUID '{input}': {err}")))?;
    let rng = &mut *ctx.rng;
    Ok(ctx.caches.uuid_get(parsed, rng)?.to_string())
}

// Rewrites month and day but keeps the year, which is all the de-identified
// dataset is allowed to retain.
fn random_date(input: &str, rng: &mut ChaCha8Rng) -> Result<String> {
    let parts: Vec<&str> = input.split('-').collect();
    if parts.len() != 3 {
        return Err(Error::Format(format!("date is not ISO-8601: '{input}'")));
    }
    let year: i32 = parts[0]
        .parse()
        .map_err(|_| Error::Format(format!("unable to parse year from date: '{input}'")))?;

    let month = rng.gen_range(1..=12);
    let day = rng.gen_range(1..=last_day_of_month(year, month));
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::Format(format!("invalid date {year}-{month:02}-{day:02}")))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::ProcessorDefinition;
    use rand::SeedableRng;

    fn context<'a>(
        caches: &'a ConsistencyCaches,
        rng: &'a mut ChaCha8Rng,
    ) -> ProcessContext<'a> {
        ProcessContext { rng, caches }
    }

    fn apply(processor: Processor, cmap: &ColumnMap, input: &str) -> Result<String> {
        let caches = ConsistencyCaches::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut ctx = ProcessContext {
            rng: &mut rng,
            caches: &caches,
        };
        processor.apply(cmap, input, &mut ctx)
    }

    #[test]
    fn catalog_round_trips_every_name() {
        for name in [
            "Identity",
            "ScrubString",
            "EmptyJson",
            "AlphaNumericScrambler",
            "UniqueAlphaNumericScrambler",
            "RandomUUID",
            "RandomDate",
            "RandomBoolean",
            "RandomDigits",
            "FakeStreetAddress",
            "FakeCity",
            "FakeState",
            "FakeStateAbbrev",
            "FakeZip",
            "FakeLatitude",
            "FakeLongitude",
            "FakeFirstName",
            "FakeLastName",
            "FakeFullName",
            "FakeUsername",
            "FakeEmailAddress",
            "FakePhoneNumber",
            "FakeIPv4",
            "FakeIPv6",
            "FakeCompanyName",
            "FakeGender",
            "FakeCurrency",
            "FakeLanguage",
            "FakeParagraph",
            "FakeUserAgent",
        ] {
            let processor = Processor::from_name(name).expect(name);
            assert_eq!(processor.name(), name);
        }
        assert!(Processor::from_name("NotAProcessor").is_none());
    }

    #[test]
    fn identity_returns_input_unchanged() {
        let out = apply(Processor::Identity, &ColumnMap::default(), "keep me").unwrap();
        assert_eq!(out, "keep me");
    }

    #[test]
    fn scrub_string_matches_rune_count() {
        let out = apply(Processor::ScrubString, &ColumnMap::default(), "foo").unwrap();
        assert_eq!(out, "***");
    }

    #[test]
    fn empty_json_is_literal() {
        let out = apply(Processor::EmptyJson, &ColumnMap::default(), "{\"a\":1}").unwrap();
        assert_eq!(out, "{}");
    }

    #[test]
    fn random_boolean_is_upper_case() {
        let out = apply(Processor::RandomBoolean, &ColumnMap::default(), "t").unwrap();
        assert!(out == "TRUE" || out == "FALSE");
    }

    #[test]
    fn random_digits_track_input_length() {
        let out = apply(Processor::RandomDigits, &ColumnMap::default(), "123456").unwrap();
        assert_eq!(out.len(), 6);
        assert!(out.bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn random_date_keeps_the_year_and_stays_valid() {
        let caches = ConsistencyCaches::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..200 {
            let mut ctx = context(&caches, &mut rng);
            let out = Processor::RandomDate
                .apply(&ColumnMap::default(), "2020-02-29", &mut ctx)
                .unwrap();
            let date = NaiveDate::parse_from_str(&out, "%Y-%m-%d").expect("valid date");
            assert_eq!(date.format("%Y").to_string(), "2020");
        }
    }

    #[test]
    fn random_date_rejects_malformed_input() {
        assert!(apply(Processor::RandomDate, &ColumnMap::default(), "2020/01/01").is_err());
        assert!(apply(Processor::RandomDate, &ColumnMap::default(), "notayear-01-01").is_err());
    }

    #[test]
    fn random_uuid_rejects_unparseable_input() {
        assert!(apply(Processor::RandomUuid, &ColumnMap::default(), "").is_err());
        assert!(apply(Processor::RandomUuid, &ColumnMap::default(), "not-a-uuid").is_err());
    }

    #[test]
    fn random_uuid_is_stable_within_a_run() {
        let caches = ConsistencyCaches::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let input = "00000000-0000-0000-0000-000000000001";

        let mut ctx = context(&caches, &mut rng);
        let first = Processor::RandomUuid
            .apply(&ColumnMap::default(), input, &mut ctx)
            .unwrap();
        let mut ctx = context(&caches, &mut rng);
        let second = Processor::RandomUuid
            .apply(&ColumnMap::default(), input, &mut ctx)
            .unwrap();

        assert_eq!(first, second);
        assert_ne!(first, input);
        assert_ne!(first, Uuid::nil().to_string());
    }

    #[test]
    fn scrambler_with_parent_joins_through_the_cache() {
        let caches = ConsistencyCaches::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let child = ColumnMap {
            table_schema: "public".to_string(),
            table_name: "orders".to_string(),
            column_name: "user_id".to_string(),
            parent_schema: "public".to_string(),
            parent_table: "users".to_string(),
            parent_column: "id".to_string(),
            processors: vec![ProcessorDefinition::named("AlphaNumericScrambler")],
            ..ColumnMap::default()
        };

        let mut ctx = context(&caches, &mut rng);
        let first = Processor::AlphaNumericScrambler
            .apply(&child, "user-7x9", &mut ctx)
            .unwrap();
        let mut ctx = context(&caches, &mut rng);
        let second = Processor::AlphaNumericScrambler
            .apply(&child, "user-7x9", &mut ctx)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), "user-7x9".len());
    }

    #[test]
    fn unique_scrambler_exhausts_on_unscramblable_input() {
        let caches = ConsistencyCaches::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let cmap = ColumnMap {
            table_schema: "public".to_string(),
            table_name: "t".to_string(),
            column_name: "c".to_string(),
            ..ColumnMap::default()
        };

        // "-" has no alphanumerics, so every scramble collides.
        let mut ctx = context(&caches, &mut rng);
        Processor::UniqueAlphaNumericScrambler
            .apply(&cmap, "-", &mut ctx)
            .unwrap();
        let mut ctx = context(&caches, &mut rng);
        let err = Processor::UniqueAlphaNumericScrambler
            .apply(&cmap, "-", &mut ctx)
            .unwrap_err();
        assert!(err.to_string().contains("unique"));
    }

    #[test]
    fn fake_processors_return_plausible_values() {
        let cmap = ColumnMap::default();
        let latitude = apply(Processor::FakeLatitude, &cmap, "x").unwrap();
        latitude.parse::<f64>().expect("latitude parses");

        let email = apply(Processor::FakeEmailAddress, &cmap, "x").unwrap();
        assert!(email.contains('@'));

        let gender = apply(Processor::FakeGender, &cmap, "x").unwrap();
        assert!(GENDERS.contains(&gender.as_str()));

        let language = apply(Processor::FakeLanguage, &cmap, "x").unwrap();
        assert!(LANGUAGES.contains(&language.as_str()));

        for processor in [
            Processor::FakeStreetAddress,
            Processor::FakeCity,
            Processor::FakeState,
            Processor::FakeStateAbbrev,
            Processor::FakeZip,
            Processor::FakeFirstName,
            Processor::FakeLastName,
            Processor::FakeFullName,
            Processor::FakeUsername,
            Processor::FakePhoneNumber,
            Processor::FakeIpv4,
            Processor::FakeIpv6,
            Processor::FakeCompanyName,
            Processor::FakeCurrency,
            Processor::FakeParagraph,
            Processor::FakeUserAgent,
        ] {
            let value = apply(processor, &cmap, "input").unwrap();
            assert!(!value.is_empty(), "{} returned empty", processor.name());
        }
    }
}
