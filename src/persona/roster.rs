//! The ordered set of personas taking part in a conversation.
//!
//! Insertion order is display order and also the rotation order used when
//! only two personas alternate.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::types::{Gender, Persona, PersonaColor};

/// Minimum number of personas needed to run a simulation.
pub const MIN_PERSONAS: usize = 2;

/// Field changes applied by [`Roster::edit`].
#[derive(Debug, Clone, Default)]
pub struct PersonaEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub gender: Option<Option<Gender>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    personas: Vec<Persona>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from existing personas, rejecting duplicate ids.
    pub fn from_personas(personas: Vec<Persona>) -> Result<Self> {
        let mut roster = Self::new();
        for persona in personas {
            roster.insert(persona)?;
        }
        Ok(roster)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Persona> {
        self.personas.iter()
    }

    pub fn as_slice(&self) -> &[Persona] {
        &self.personas
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Look a persona up by id, or by name ignoring case.
    pub fn resolve(&self, key: &str) -> Result<&Persona> {
        self.get(key)
            .or_else(|| {
                self.personas
                    .iter()
                    .find(|p| p.name.eq_ignore_ascii_case(key.trim()))
            })
            .ok_or_else(|| Error::persona_not_found(key))
    }

    /// Personas other than `excluded`, in roster order.
    pub fn others(&self, excluded: Option<&str>) -> Vec<&Persona> {
        self.personas
            .iter()
            .filter(|p| Some(p.id.as_str()) != excluded)
            .collect()
    }

    /// Add a new persona; the color follows the current roster size.
    pub fn add(
        &mut self,
        name: &str,
        description: &str,
        gender: Option<Gender>,
    ) -> Result<&Persona> {
        let (name, description) = validate_fields(name, description)?;
        let color = PersonaColor::for_index(self.personas.len());
        self.personas
            .push(Persona::new(name, description, color, gender));
        Ok(&self.personas[self.personas.len() - 1])
    }

    /// Insert a fully built persona (loaded settings, tests).
    pub fn insert(&mut self, persona: Persona) -> Result<()> {
        validate_fields(&persona.name, &persona.description)?;
        if self.contains(&persona.id) {
            return Err(Error::persona_invalid(format!(
                "duplicate persona id '{}'",
                persona.id
            )));
        }
        self.personas.push(persona);
        Ok(())
    }

    /// Apply the given changes to the persona with `id`.
    pub fn edit(&mut self, id: &str, edit: PersonaEdit) -> Result<&Persona> {
        let persona = self
            .personas
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::persona_not_found(id))?;

        let name = edit.name.as_deref().unwrap_or(&persona.name);
        let description = edit.description.as_deref().unwrap_or(&persona.description);
        let (name, description) = validate_fields(name, description)?;

        persona.name = name;
        persona.description = description;
        if let Some(gender) = edit.gender {
            persona.gender = gender;
        }
        Ok(persona)
    }

    pub fn remove(&mut self, id: &str) -> Result<Persona> {
        let index = self
            .personas
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::persona_not_found(id))?;
        Ok(self.personas.remove(index))
    }

    /// Fails unless enough personas are configured to hold a conversation.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.personas.len() < MIN_PERSONAS {
            return Err(Error::RosterTooSmall {
                count: self.personas.len(),
            });
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Roster {
    type Item = &'a Persona;
    type IntoIter = std::slice::Iter<'a, Persona>;

    fn into_iter(self) -> Self::IntoIter {
        self.personas.iter()
    }
}

fn validate_fields(name: &str, description: &str) -> Result<(String, String)> {
    let name = name.trim();
    let description = description.trim();
    if name.is_empty() {
        return Err(Error::persona_invalid("name cannot be empty"));
    }
    if description.is_empty() {
        return Err(Error::persona_invalid("description cannot be empty"));
    }
    Ok((name.to_string(), description.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_personas() -> Roster {
        let mut roster = Roster::new();
        roster.add("Alice", "Loves espresso", None).unwrap();
        roster.add("Bob", "Drinks tea only", Some(Gender::Male)).unwrap();
        roster
    }

    #[test]
    fn test_add_assigns_colors_in_order() {
        let roster = two_personas();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.as_slice()[0].color, PersonaColor::Blue);
        assert_eq!(roster.as_slice()[1].color, PersonaColor::Yellow);
    }

    #[test]
    fn test_add_requires_name_and_description() {
        let mut roster = Roster::new();
        assert!(roster.add("   ", "desc", None).is_err());
        assert!(roster.add("Name", "", None).is_err());
        assert!(roster.is_empty());

        let persona = roster.add("  Carol ", " Tea expert ", None).unwrap();
        assert_eq!(persona.name, "Carol");
        assert_eq!(persona.description, "Tea expert");
    }

    #[test]
    fn test_remove_and_ids_not_reused() {
        let mut roster = two_personas();
        let alice_id = roster.as_slice()[0].id.clone();
        let removed = roster.remove(&alice_id).unwrap();
        assert_eq!(removed.name, "Alice");

        let added = roster.add("Alice", "Loves espresso", None).unwrap();
        assert_ne!(added.id, removed.id);
        assert!(roster.remove("persona-missing").is_err());
    }

    #[test]
    fn test_edit() {
        let mut roster = two_personas();
        let id = roster.as_slice()[1].id.clone();

        let edited = roster
            .edit(
                &id,
                PersonaEdit {
                    description: Some("Switched to coffee".into()),
                    gender: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.name, "Bob");
        assert_eq!(edited.description, "Switched to coffee");
        assert!(edited.gender.is_none());

        let blank = PersonaEdit {
            name: Some(" ".into()),
            ..Default::default()
        };
        assert!(roster.edit(&id, blank).is_err());
        assert_eq!(roster.get(&id).unwrap().name, "Bob");
    }

    #[test]
    fn test_resolve_by_id_or_name() {
        let roster = two_personas();
        let bob_id = roster.as_slice()[1].id.clone();
        assert_eq!(roster.resolve(&bob_id).unwrap().name, "Bob");
        assert_eq!(roster.resolve("alice").unwrap().name, "Alice");
        assert!(roster.resolve("Carol").is_err());
    }

    #[test]
    fn test_others_excludes_last_speaker() {
        let roster = two_personas();
        let alice = roster.as_slice()[0].id.clone();
        let others = roster.others(Some(&alice));
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].name, "Bob");
        assert_eq!(roster.others(None).len(), 2);
    }

    #[test]
    fn test_ensure_ready() {
        let mut roster = Roster::new();
        assert!(matches!(
            roster.ensure_ready(),
            Err(Error::RosterTooSmall { count: 0 })
        ));
        roster.add("Solo", "Alone", None).unwrap();
        assert!(roster.ensure_ready().is_err());
        roster.add("Duo", "Company", None).unwrap();
        assert!(roster.ensure_ready().is_ok());
    }

    #[test]
    fn test_from_personas_rejects_duplicates() {
        let a = Persona::with_id("a", "Alice", "x", PersonaColor::Blue);
        let dup = Persona::with_id("a", "Other", "y", PersonaColor::Red);
        assert!(Roster::from_personas(vec![a, dup]).is_err());
    }
}
