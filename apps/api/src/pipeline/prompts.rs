// Extraction prompt template.
// The model is addressed in French because the review grid and its column
// names are French; the `{text}` placeholder receives the redacted résumé.

pub const EXTRACTION_PROMPT: &str = r#"
Tu joues le rôle d'un recruteur data qui doit extraire des informations clés d'un CV.
Un(e) candidat(e) a envoyé son CV par mail.

Retrouve les éléments suivants dans le CV :
- L'année de diplomation
- La durée totale d'expérience professionnelle cumulée en années
- Les entreprises associées aux expériences professionnelles (pas celles liées aux stages)
- Les 5 compétences techniques data clés
- Si le candidat est freelance ou non.

Je veux une réponse en un seul string ayant la structure suivante :
{"Freelance" : "OUI/NON",
"Année de diplomation": "YYYY",
"Expérience": "X",
"Entreprises":"entreprise1, entreprise2, entreprise3",
"Compétences": "compétence1, compétence2, compétence3, compétence4, compétence5"}

Pour l'année de diplomation, fais attention car parfois une formation est spécifiée avec les dates de début et de fin.
Par exemple : 09/2022 - 06/2024 ou bien 2021 à 2022. Dans ces cas-là, il faut aller chercher l'année de fin, c'est-à-dire
respectivement 2024 et 2022. De plus il peut y avoir plusieurs diplômes, dans ce cas, il faut prendre le plus récent.

Pour la durée d'expérience, merci de ne pas compter les stages ou alternances, seulement les expériences professionnelles.
Par exemple, si le candidat a travaillé 6 mois en stage et 2 ans et demi en CDI, merci de renvoyer 2,5.

CV: {text}
"#;
