//! Specialty catalog
//!
//! The consultation service only ever selects from this list. Names outside
//! it are still accepted from the stream, but logged.

/// Specialties the consultation service can route a question to
pub const KNOWN_SPECIALTIES: &[&str] = &[
    "Pathology",
    "Hematology",
    "Allergy Immunology",
    "Audiology",
    "Cardiology",
    "Critical Care",
    "Dentistry",
    "Dermatology",
    "Elderly Care",
    "Emergency",
    "Endocrinology",
    "Epidemiology",
    "Ethics",
    "Fitness Sports",
    "Gastroenterology",
    "General Surgery",
    "Genetics",
    "Head Neck Surgery",
    "Health AI",
    "Health Economics",
    "Health Education",
    "Health Entrepreneurship",
    "Hospital Management",
    "Infectious Diseases",
    "Internal Medicine",
    "Lab Medicine",
    "Mental Health",
    "Neurology",
    "Neuroscience",
    "Nutrition",
    "Obstetrics Gynecology",
    "Oncology",
    "Ophthalmology",
    "Orthopedics",
    "Palliative Care",
    "Pediatric Surgery",
    "Pediatrics",
    "Pharmacy",
    "Physical Medicine and Rehabilitation",
    "Preventive Medicine",
    "Psychiatry",
    "Public Health",
    "Pulmonology",
    "Radiology",
    "Rare Diseases",
    "Rheumatology",
    "Sleep",
    "Social Media Addiction",
    "Supplements",
    "Vaccination",
    "Wearables",
    "Wellbeing",
    "Work Health",
];

/// Sentinel the service sends instead of a specialty list
pub const NOT_HEALTH_RELATED: &str = "Nohealth";

pub fn is_known(name: &str) -> bool {
    KNOWN_SPECIALTIES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_specialties() {
        assert!(is_known("Cardiology"));
        assert!(is_known("Physical Medicine and Rehabilitation"));
        assert!(!is_known("cardiology"));
        assert!(!is_known(NOT_HEALTH_RELATED));
    }
}
