/*!

This is the long-form manual for `species_ranking` and `vegrank`.

## Records

A record is one site visit exported from the survey forms, as a flat table with one
column per form field. Each form has a field prefix (`PG` for perennial grasses,
`AG` for annual grasses, `F` for forbs, ...) and a fixed number of slots. A slot is
a botanical name and, for most forms, a cover estimate:

```text
SITE:SITE_ID,PG_SP:PG1_NAME,PG_COVER:PG_SP1_COVER,PG_SP:PG2_NAME,PG_COVER:PG_SP2_COVER
ABC01,Themeda triandra,20,astrebla_lappacea,15
```

Names are cleaned before anything else: underscores and dashes become spaces,
spaces are collapsed, and the case is normalized (`Themeda triandra` by default,
`Themeda Triandra` with the title case). `nan`, `none`, `blank` and empty cells
are the "no data" placeholder.

A cover that is blank or cannot be read as a number is absent. Absent is not
zero: a species recorded with a cover of `0` ranks before a species without any
cover.

When a form offers "Other" choices, selecting `Other3` means that the real name is
written in the field `PG_SP:PG_OTHER3`. If that field is blank, the slot keeps the
name `Other3`.

## Categories

The slots of a form are sent to categories:
- either all of them to a single category (annual grasses),
- or split with a membership list: the slots whose name is in the list go to one
  category (3P grasses), all the others to another one (other perennial grasses).
  The placeholder is never a member.

Categories are then processed in the order of declaration. In each category, the
species are ordered by decreasing cover, the absent covers last. Among equal
covers a named species comes before a blank slot, then the slot order breaks the
ties. A species without cover received as overflow therefore still ranks before
the blank slots of the target category. The first `width` species are kept. The
others are the overflow of the category.

A category may send its overflow into another category, declared after it. The
overflow then competes with the other species of the target category, with its own
cover. A 3P grass ranked fifth in a category of width 4 can still be the first
species of the other perennial grasses. Overflow flows one way only.

Blank slots are not removed: a category with fewer species than its width still
shows a row for each slot it received.

The common name of each kept species comes from the common names table. A species
missing from the table is its own common name.

The total of a category is the sum of the covers of its kept species, the absent
covers counting as zero. Site totals add the totals of several categories.

## Reconciliation

Site forms also record totals of their own, such as the proportion of forbs. A
reconciliation reads such a field and subtracts the totals of some categories:

```json
{
  "name": "perennial_forb_adjusted",
  "recordedField": "F_SUM_PROP",
  "subtract": ["AF"],
  "when": { "field": "SITE_VEG_FRACTIONS:VEG_COVER_ADJUST", "equals": "representative" },
  "fallbackField": "SITE_VEG_FRACTIONS:F_TOTAL_ADJUSTED"
}
```

The value is amended when the `when` field matches (trimmed, ignoring the case)
and one of the `subtract` categories kept a species with a cover. Otherwise the
`fallbackField` is reported as recorded, or the `recordedField` when there is no
fallback. Without `when`, only the covers decide.

## Configuration

`vegrank` reads a JSON configuration file:

```json
{
  "outputSettings": { "surveyName": "Star transect", "absentCover": "zero" },
  "recordSources": [ { "provider": "csv", "filePath": "records.csv", "idField": "SITE:SITE_ID" } ],
  "reference": {
    "membershipLists": [
      { "name": "3P", "provider": "xlsx", "filePath": "veg.xlsx", "sheet": "PPP_COMP", "column": "D" }
    ],
    "commonNames": {
      "provider": "xlsx", "filePath": "veg.xlsx", "sheet": "completeGrassForb",
      "botanicalColumn": "copyBotanical2", "commonColumn": "copyCommon"
    }
  },
  "groups": [
    { "fieldPrefix": "PG", "slotCount": 10, "membershipList": "3P",
      "memberCategory": "3P", "nonMemberCategory": "PG" },
    { "fieldPrefix": "AG", "slotCount": 10, "category": "AG" }
  ],
  "categories": [
    { "name": "3P", "width": 4, "overflowInto": "PG" },
    { "name": "PG", "width": 4 },
    { "name": "AG", "width": 4 }
  ],
  "totals": [ { "name": "perennial", "categories": ["3P", "PG"] } ],
  "reconciliations": []
}
```

Relative paths are resolved from the directory of the configuration file.

Sources (`recordSources`, `membershipLists`, `commonNames`):
- `provider`: `csv` or `xlsx`
- `sheet` (xlsx only, optional): the name of the worksheet. The first one is used by default.
- columns are a number (1-based), a spreadsheet letter (`"D"`) or a header name.
  Names of one to three capital letters are read as letters: write
  `{"header": "ID"}` for a header named `ID`.
- `firstRow` (optional, 1-based): the first row of data. By default the first row is
  skipped when a column is given by its header name.
- `idField` (records only, optional): the field with the id of the site. When it is
  missing or blank, the id is `<file name>-<line number>`.

Groups:
- `fieldPrefix`, `slotCount`
- either `category`, or `membershipList` with `memberCategory` and `nonMemberCategory`
- `nameField`, `coverField`, `otherField` (optional): the templates of the field
  names, where `{p}` is the prefix and `{i}` the slot number. The defaults are
  `{p}_SP:{p}{i}_NAME`, `{p}_COVER:{p}_SP{i}_COVER` and `{p}_SP:{p}_OTHER{i}`.
- `namesOnly` (optional): the form has no cover fields.

Output settings:
- `surveyName`
- `outputDirectory` (optional): where the CSV report is written when `--csv-out`
  is a bare file name.
- `absentCover`: how absent covers are written in the CSV report: `"zero"` (the
  default), `"blank"`, or `{"marker": "n/a"}`. The JSON summary always uses `null`.
- `nameCase` (optional): `"sentence"` (the default) or `"title"`.

The configuration is checked before any record is read. A width of 0, an unknown
category, an unknown membership list, or an overflow going into a category
declared before its source are errors. So is a site total or a reconciliation
named like a column of the report (`id`, `3P_total`, `PG_cover_2`, ...) or like
another total.

## Outputs

The JSON summary has one entry per record, with for each category the kept
species, the overflow, and the total. The flat CSV report has one row per record,
with the columns `<category>_bot_<k>`, `<category>_common_<k>` and
`<category>_cover_<k>` for each of the `width` positions, `<category>_total`,
one column per site total, and one column per reconciliation (blank when the
field could not be read). In the JSON summary, each reconciliation gives its
`value` and whether it was `amended`.

 */
